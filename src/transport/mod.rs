// transport/mod.rs — event broker transport.
//
// The reconciliation pipeline talks to the broker through the narrow
// `EventTransport` trait: subscribe to a channel, publish a record. Inbound
// event delivery happens out-of-band — the concrete transport pushes decoded
// records into the ingest mpsc channel it was spawned with.

pub mod ws;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::topology::model::EventRecord;

/// Outbound operations the daemon may request from the broker connection.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Ask the broker to deliver events published on `channel`.
    async fn subscribe(&self, channel: &str) -> Result<()>;

    /// Publish a record on `channel` (e.g. a remove-runtime command).
    async fn publish(&self, channel: &str, record: &EventRecord) -> Result<()>;

    /// Whether the broker connection is currently up. Purely informational —
    /// used by the health endpoint.
    fn connected(&self) -> bool {
        true
    }
}

// ─── Wire frames ──────────────────────────────────────────────────────────────

/// JSON frames exchanged with the broker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    Subscribe {
        channel: String,
    },
    Publish {
        channel: String,
        payload: EventRecord,
    },
    Event {
        channel: String,
        payload: EventRecord,
    },
}
