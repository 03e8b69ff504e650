//! Integration tests for the snapshot-then-live ingest pipeline: stub state
//! service, recording transport, real broadcaster.

use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use meshd::config::{ConfigOverrides, MeshdConfig};
use meshd::events::EventBroadcaster;
use meshd::ingest;
use meshd::install::RuntimeInstaller;
use meshd::state_service::StateServiceClient;
use meshd::topology::model::EventRecord;
use meshd::topology::reconciler::Reconciler;
use meshd::transport::EventTransport;
use meshd::AppContext;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tokio::time::timeout;

// ─── Test doubles ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct RecordingTransport {
    subscribes: StdMutex<Vec<String>>,
}

#[async_trait]
impl EventTransport for RecordingTransport {
    async fn subscribe(&self, channel: &str) -> anyhow::Result<()> {
        self.subscribes.lock().unwrap().push(channel.to_string());
        Ok(())
    }

    async fn publish(&self, _channel: &str, _record: &EventRecord) -> anyhow::Result<()> {
        Ok(())
    }
}

async fn spawn_state_stub(records: Vec<EventRecord>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = axum::Router::new().route(
        "/net-state",
        axum::routing::get(move || {
            let records = records.clone();
            async move { axum::Json(records) }
        }),
    );
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://127.0.0.1:{}", addr.port())
}

fn test_ctx(state_url: &str, transport: Arc<RecordingTransport>) -> Arc<AppContext> {
    let config = Arc::new(MeshdConfig::new(
        ConfigOverrides {
            state_url: Some(state_url.to_string()),
            ..Default::default()
        },
        None,
    ));
    Arc::new(AppContext {
        config,
        topology: Arc::new(tokio::sync::Mutex::new(Reconciler::new())),
        broadcaster: Arc::new(EventBroadcaster::new()),
        transport,
        state: Arc::new(StateServiceClient::new(state_url)),
        installer: Arc::new(RuntimeInstaller::new()),
        started_at: std::time::Instant::now(),
    })
}

fn record(cmd: &str, id: &str, topic: Option<&str>) -> EventRecord {
    let mut r = EventRecord::new(cmd, id);
    r.topic = topic.map(str::to_string);
    r
}

async fn next_notification(rx: &mut broadcast::Receiver<String>) -> Value {
    let raw = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for a notification")
        .expect("broadcast channel closed");
    serde_json::from_str(&raw).expect("notification should be JSON")
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn snapshot_is_replayed_then_live_events_flow() {
    let mut runtime = record("rt-start", "R1", None);
    runtime
        .attrs
        .insert("address".to_string(), Value::String("10.0.0.7".to_string()));
    let snapshot = vec![runtime, record("pub-start", "P1", Some("t"))];
    let state_url = spawn_state_stub(snapshot).await;

    let transport = Arc::new(RecordingTransport::default());
    let ctx = test_ctx(&state_url, transport.clone());
    let mut notifications = ctx.broadcaster.subscribe();

    let (event_tx, event_rx) = mpsc::channel(16);
    tokio::spawn(ingest::run(ctx.clone(), event_rx));

    // One aggregate diff for the whole snapshot.
    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification["method"], "topology.diff");
    let added = notification
        .pointer("/params/entitiesAdded")
        .and_then(Value::as_array)
        .unwrap();
    assert_eq!(added.len(), 2);

    // The announcement channel and the new runtime's channel were requested.
    {
        let subscribes = transport.subscribes.lock().unwrap();
        assert!(subscribes.contains(&"mesh/rt".to_string()));
        assert!(subscribes.contains(&"mesh/rt/R1".to_string()));
    }

    // A live subscriber completes the edge.
    event_tx
        .send(record("sub-start", "S1", Some("t")))
        .await
        .unwrap();
    let notification = next_notification(&mut notifications).await;
    let edges = notification
        .pointer("/params/edgesAdded")
        .and_then(Value::as_array)
        .unwrap();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0]["source"], "P1");
    assert_eq!(edges[0]["target"], "S1");
}

#[tokio::test]
async fn no_op_and_malformed_events_are_swallowed() {
    let state_url = spawn_state_stub(vec![]).await;
    let ctx = test_ctx(&state_url, Arc::new(RecordingTransport::default()));
    let mut notifications = ctx.broadcaster.subscribe();

    let (event_tx, event_rx) = mpsc::channel(16);
    tokio::spawn(ingest::run(ctx.clone(), event_rx));

    // A redundant remove and an unknown command produce no notification; the
    // next real event's diff is the first thing a renderer sees.
    event_tx
        .send(record("pub-stop", "ghost", None))
        .await
        .unwrap();
    event_tx
        .send(record("not-a-command", "X1", None))
        .await
        .unwrap();
    event_tx
        .send(record("rt-start", "R1", None))
        .await
        .unwrap();

    let notification = next_notification(&mut notifications).await;
    let added = notification
        .pointer("/params/entitiesAdded")
        .and_then(Value::as_array)
        .unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0]["id"], "R1");
}

#[tokio::test]
async fn snapshot_fetch_failure_starts_empty_and_keeps_going() {
    // Nothing listens here — the fetch fails.
    let dead = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        format!("http://127.0.0.1:{}", listener.local_addr().unwrap().port())
    };
    let ctx = test_ctx(&dead, Arc::new(RecordingTransport::default()));
    let mut notifications = ctx.broadcaster.subscribe();

    let (event_tx, event_rx) = mpsc::channel(16);
    tokio::spawn(ingest::run(ctx.clone(), event_rx));

    event_tx
        .send(record("rt-start", "R1", None))
        .await
        .unwrap();

    let notification = next_notification(&mut notifications).await;
    assert_eq!(notification["method"], "topology.diff");
    assert_eq!(ctx.topology.lock().await.store().len(), 1);
}
