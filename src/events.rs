use chrono::Utc;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::topology::model::TopologyDiff;

/// Broadcasts topology notifications to all connected rendering clients.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<String>,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1024);
        Self { tx }
    }

    /// Send a notification to all connected clients.
    pub fn broadcast(&self, method: &str, params: Value) {
        let notification = serde_json::json!({
            "method": method,
            "params": params,
            "ts": Utc::now().to_rfc3339(),
        });
        // Ignore errors — no subscribers is fine
        let _ = self
            .tx
            .send(serde_json::to_string(&notification).unwrap_or_default());
    }

    /// Publish a `topology.diff` notification.
    pub fn broadcast_diff(&self, diff: &TopologyDiff) {
        self.broadcast(
            "topology.diff",
            serde_json::to_value(diff).unwrap_or_default(),
        );
    }

    /// Subscribe to all broadcast notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}
