//! Outbound WebSocket client for the event broker.
//!
//! Protocol:
//! 1. Connect to the broker URL (`[broker] url` in meshd.toml)
//! 2. Re-issue every channel subscription requested so far
//! 3. Drain queued outbound frames (subscribe/publish) onto the socket
//! 4. Decode inbound `event` frames and push their records into the ingest
//!    channel, strictly in arrival order
//! 5. On disconnect: reconnect with exponential backoff (2s → 4s → 8s … max 60s)
//!
//! Outbound frames queued while the connection is down are delivered after
//! the next reconnect; a frame lost to a mid-send failure is not retried —
//! delivery guarantees beyond reconnect-and-resubscribe belong to the broker.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, trace, warn};

use crate::config::MeshdConfig;
use crate::topology::model::EventRecord;

use super::{EventTransport, Frame};

// ─── Handle ───────────────────────────────────────────────────────────────────

/// Handle held by the rest of the daemon. Requests are queued to the
/// background connection task; the queue survives reconnects.
pub struct WsTransport {
    out_tx: mpsc::Sender<Frame>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl EventTransport for WsTransport {
    async fn subscribe(&self, channel: &str) -> Result<()> {
        self.out_tx
            .send(Frame::Subscribe {
                channel: channel.to_string(),
            })
            .await
            .context("broker connection task is gone")
    }

    async fn publish(&self, channel: &str, record: &EventRecord) -> Result<()> {
        self.out_tx
            .send(Frame::Publish {
                channel: channel.to_string(),
                payload: record.clone(),
            })
            .await
            .context("broker connection task is gone")
    }

    fn connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

// ─── Spawn ────────────────────────────────────────────────────────────────────

/// Start the background connection task. Decoded event records are pushed
/// into `events` in arrival order.
pub fn spawn(config: Arc<MeshdConfig>, events: mpsc::Sender<EventRecord>) -> Arc<WsTransport> {
    let (out_tx, out_rx) = mpsc::channel(128);
    let connected = Arc::new(AtomicBool::new(false));
    tokio::spawn(broker_loop(config, events, out_rx, connected.clone()));
    Arc::new(WsTransport { out_tx, connected })
}

// ─── Background loop ──────────────────────────────────────────────────────────

async fn broker_loop(
    config: Arc<MeshdConfig>,
    events: mpsc::Sender<EventRecord>,
    mut out_rx: mpsc::Receiver<Frame>,
    connected: Arc<AtomicBool>,
) {
    let mut backoff_secs: u64 = 2;
    // Channels subscribed so far — re-issued after every reconnect.
    let mut subscriptions: BTreeSet<String> = BTreeSet::new();

    loop {
        info!(url = %config.broker_url, "broker: connecting");

        match connect_async(config.broker_url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!("broker: connected");
                backoff_secs = 2;
                connected.store(true, Ordering::Relaxed);

                let (mut sink, mut stream) = ws_stream.split();

                let mut healthy = true;
                for channel in &subscriptions {
                    let frame = Frame::Subscribe {
                        channel: channel.clone(),
                    };
                    if !send_frame(&mut sink, &frame).await {
                        healthy = false;
                        break;
                    }
                }

                while healthy {
                    tokio::select! {
                        frame = out_rx.recv() => match frame {
                            Some(frame) => {
                                if let Frame::Subscribe { channel } = &frame {
                                    subscriptions.insert(channel.clone());
                                }
                                if !send_frame(&mut sink, &frame).await {
                                    break;
                                }
                            }
                            // All senders dropped — the daemon is shutting down.
                            None => {
                                connected.store(false, Ordering::Relaxed);
                                return;
                            }
                        },
                        msg = stream.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<Frame>(&text) {
                                    Ok(Frame::Event { channel, payload }) => {
                                        trace!(channel = %channel, cmd = %payload.cmd, "broker: event");
                                        if events.send(payload).await.is_err() {
                                            // Ingest loop is gone — nothing left to feed.
                                            connected.store(false, Ordering::Relaxed);
                                            return;
                                        }
                                    }
                                    Ok(other) => {
                                        debug!("broker: ignoring unexpected frame: {other:?}");
                                    }
                                    Err(e) => {
                                        warn!("broker: dropping undecodable frame: {e}");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                warn!("broker: connection closed");
                                break;
                            }
                            Some(Ok(_)) => {} // ping/pong/binary — ignored
                            Some(Err(e)) => {
                                warn!("broker: read error: {e}");
                                break;
                            }
                        },
                    }
                }
            }
            Err(e) => warn!("broker: connection failed: {e:#}"),
        }

        connected.store(false, Ordering::Relaxed);
        sleep_backoff(&mut backoff_secs).await;
    }
}

/// Serialize and send one frame. Returns `false` when the connection should
/// be considered dead.
async fn send_frame<S>(sink: &mut S, frame: &Frame) -> bool
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    let text = match serde_json::to_string(frame) {
        Ok(text) => text,
        Err(e) => {
            warn!("broker: could not serialize frame: {e}");
            return true;
        }
    };
    match sink.send(Message::Text(text)).await {
        Ok(()) => true,
        Err(e) => {
            warn!("broker: send failed: {e}");
            false
        }
    }
}

async fn sleep_backoff(backoff_secs: &mut u64) {
    debug!("broker: retrying in {backoff_secs}s");
    tokio::time::sleep(Duration::from_secs(*backoff_secs)).await;
    *backoff_secs = (*backoff_secs * 2).min(60);
}
