// SPDX-License-Identifier: MIT
//! The serialized event pipeline: snapshot replay first, then live events.
//!
//! This loop is the only writer to the reconciler. Events are applied in the
//! order the transport delivers them — no reordering, no retry, no
//! cancellation. Out-of-order delivery (a stop before its start) is safe
//! because a remove of an unknown id is a no-op.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::observability::LatencyTracker;
use crate::topology::model::{EntityKind, EventRecord, TopologyDiff};
use crate::topology::snapshot;
use crate::AppContext;

/// Run the pipeline until the transport's event channel closes.
pub async fn run(ctx: Arc<AppContext>, mut events: mpsc::Receiver<EventRecord>) {
    // Subscribe to the root announcement channel before fetching the
    // snapshot, so nothing announced in between is missed — any events that
    // arrive during the fetch queue up behind the replay.
    if let Err(e) = ctx.transport.subscribe(&ctx.config.topic_prefix).await {
        warn!("could not subscribe to the announcement channel: {e:#}");
    }

    // ── Baseline snapshot ─────────────────────────────────────────────────────
    match ctx.state.fetch_all().await {
        Ok(records) => {
            let tracker = LatencyTracker::start("snapshot.load");
            // The lock is held for the whole replay: no live event may
            // interleave with a partially applied snapshot.
            let diff = {
                let mut topology = ctx.topology.lock().await;
                snapshot::load(&mut topology, &records)
            };
            tracker.finish();

            subscribe_new_runtimes(&ctx, &diff).await;
            if !diff.is_empty() {
                ctx.broadcaster.broadcast_diff(&diff);
            }
        }
        Err(e) => {
            warn!("snapshot fetch failed — starting from an empty model: {e:#}");
        }
    }

    // ── Live events ───────────────────────────────────────────────────────────
    info!("entering live event loop");
    while let Some(record) = events.recv().await {
        let result = {
            let mut topology = ctx.topology.lock().await;
            topology.apply(&record)
        };
        match result {
            Ok(diff) => {
                subscribe_new_runtimes(&ctx, &diff).await;
                if diff.is_empty() {
                    debug!(cmd = %record.cmd, id = %record.id, "event was a no-op");
                } else {
                    ctx.broadcaster.broadcast_diff(&diff);
                }
            }
            Err(e) => {
                warn!(cmd = %record.cmd, id = %record.id, "dropping event: {e}");
            }
        }
    }
    info!("event channel closed — ingest loop exiting");
}

/// Every newly announced runtime gets its own scoped event channel; ask the
/// broker for it so that runtime's module/endpoint events reach us. Duplicate
/// announcements re-request the same channel, which the transport dedupes.
async fn subscribe_new_runtimes(ctx: &Arc<AppContext>, diff: &TopologyDiff) {
    for entity in &diff.entities_added {
        if entity.kind == EntityKind::Runtime {
            let channel = ctx.config.runtime_channel(&entity.id);
            if let Err(e) = ctx.transport.subscribe(&channel).await {
                warn!(channel = %channel, "runtime channel subscribe failed: {e:#}");
            }
        }
    }
}
