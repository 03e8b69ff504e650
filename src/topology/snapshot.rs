// SPDX-License-Identifier: MIT
// Snapshot replay — establishes the baseline model before live events.

use tracing::{info, warn};

use super::model::{EventRecord, TopologyDiff};
use super::reconciler::Reconciler;

/// Replay a bulk snapshot through the reconciler, in the given order, and
/// return the merged diff.
///
/// Snapshot records and live events share the same `cmd`-carrying wire
/// shape, so each record goes through the reconciler's normal path. The
/// caller must hold the reconciler for the whole replay — nothing else may
/// interleave a live event with a partially applied snapshot.
///
/// Records the reconciler rejects are skipped with a diagnostic; one bad
/// record never aborts the load.
pub fn load(reconciler: &mut Reconciler, records: &[EventRecord]) -> TopologyDiff {
    let mut aggregate = TopologyDiff::default();
    let mut skipped = 0usize;

    for record in records {
        match reconciler.apply(record) {
            Ok(diff) => aggregate.merge(diff),
            Err(e) => {
                skipped += 1;
                warn!(cmd = %record.cmd, id = %record.id, "skipping snapshot record: {e}");
            }
        }
    }

    info!(
        records = records.len(),
        skipped,
        entities = reconciler.store().len(),
        "snapshot replay complete"
    );
    aggregate
}

// ─── Tests ───────────────────────────────────────────────────────────────────
