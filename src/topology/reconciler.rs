// SPDX-License-Identifier: MIT
// Event reconciler — applies one lifecycle event or snapshot record to the
// entity store and topic index, and derives the connectivity diff.

use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::error::EventError;

use super::index::TopicIndex;
use super::model::{
    classify, Edge, Entity, EntityKind, EventAction, EventRecord, TopologyDiff, TopologyGraph,
};
use super::store::{EntityStore, Upsert};

/// Owns the entity store, the topic index, and the per-topic last-emitted
/// edge sets. All mutation flows through [`Reconciler::apply`] on a single
/// serialized path; collaborators only ever read.
#[derive(Debug, Default)]
pub struct Reconciler {
    store: EntityStore,
    index: TopicIndex,
    /// Last edge set emitted per topic, diffed against on recomputation so
    /// unchanged edges are never re-emitted.
    emitted: HashMap<String, BTreeSet<Edge>>,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event record and return the resulting diff.
    ///
    /// A remove for an unknown id yields an empty diff (the event source
    /// delivers at-least-once, so redundant removes are routine). An unknown
    /// `cmd` or empty `id` is an [`EventError`] — a diagnostic for the
    /// caller, never a reason to stop processing.
    pub fn apply(&mut self, record: &EventRecord) -> Result<TopologyDiff, EventError> {
        if record.cmd.is_empty() {
            return Err(EventError::MissingField("cmd"));
        }
        if record.id.is_empty() {
            return Err(EventError::MissingField("id"));
        }
        let (kind, action) = classify(&record.cmd)?;

        let mut diff = TopologyDiff::default();
        match action {
            EventAction::Add => self.apply_add(kind, record, &mut diff),
            EventAction::Remove => self.apply_remove(kind, record, &mut diff),
        }
        Ok(diff)
    }

    // ── Add path ──────────────────────────────────────────────────────────────

    fn apply_add(&mut self, kind: EntityKind, record: &EventRecord, diff: &mut TopologyDiff) {
        let entity = Entity::from_record(kind, record);

        if let Some(parent) = entity.parent.as_deref() {
            if !self.store.contains(parent) {
                // Tolerated: the parent's event may still be in flight.
                debug!(id = %entity.id, parent = %parent, "parent unknown — keeping orphan");
            }
        }

        // Re-adds are reported as added too; renderers treat a duplicate
        // node add as a no-op.
        diff.entities_added.push(entity.clone());

        match self.store.upsert(entity.clone()) {
            Upsert::Inserted => {
                if entity.kind.is_endpoint() {
                    self.index.bind(&entity);
                    if let Some(topic) = entity.topic.as_deref() {
                        self.recompute_topic(topic, diff);
                    }
                }
            }
            Upsert::Replaced(previous) => {
                let same_binding =
                    previous.kind == entity.kind && previous.topic == entity.topic;
                if same_binding {
                    // Pure refresh — the binding is already in place and the
                    // edge set cannot have changed.
                    return;
                }
                self.index.unbind(&previous);
                self.index.bind(&entity);

                let mut affected = BTreeSet::new();
                if previous.kind.is_endpoint() {
                    affected.extend(previous.topic.clone());
                }
                if entity.kind.is_endpoint() {
                    affected.extend(entity.topic.clone());
                }
                for topic in affected {
                    self.recompute_topic(&topic, diff);
                }
            }
        }
    }

    // ── Remove path ───────────────────────────────────────────────────────────

    fn apply_remove(&mut self, kind: EntityKind, record: &EventRecord, diff: &mut TopologyDiff) {
        let Some(entity) = self.store.remove(&record.id) else {
            debug!(id = %record.id, cmd = %record.cmd, "remove of unknown id — ignored");
            return;
        };
        if entity.kind != kind {
            debug!(
                id = %record.id,
                stored = %entity.kind.as_str(),
                commanded = %kind.as_str(),
                "remove kind differs from stored kind — removing anyway"
            );
        }

        // Cascade: a runtime or module takes its whole subtree with it, so
        // the index and the renderer never see dangling descendants.
        let mut removed = vec![entity];
        for id in self.store.descendants_of(&record.id) {
            if let Some(descendant) = self.store.remove(&id) {
                removed.push(descendant);
            }
        }

        let mut affected = BTreeSet::new();
        for entity in &removed {
            if entity.kind.is_endpoint() {
                self.index.unbind(entity);
                affected.extend(entity.topic.clone());
            }
        }
        diff.entities_removed.extend(removed);
        for topic in affected {
            self.recompute_topic(&topic, diff);
        }
    }

    // ── Edge recomputation ────────────────────────────────────────────────────

    /// Diff the topic's current cross product against what was last emitted
    /// for it. Only the affected topic is ever touched.
    fn recompute_topic(&mut self, topic: &str, diff: &mut TopologyDiff) {
        let current = self.index.edges_for(topic);
        let previous = self.emitted.remove(topic).unwrap_or_default();

        diff.edges_added
            .extend(current.difference(&previous).cloned());
        diff.edges_removed
            .extend(previous.difference(&current).cloned());

        if !current.is_empty() {
            self.emitted.insert(topic.to_string(), current);
        }
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// The full current graph, for clients that sync from scratch.
    pub fn graph(&self) -> TopologyGraph {
        let nodes = self.store.list(None).into_iter().cloned().collect();
        let mut edges: Vec<Edge> = self
            .emitted
            .values()
            .flat_map(|set| set.iter().cloned())
            .collect();
        edges.sort();
        TopologyGraph { nodes, edges }
    }

    pub fn store(&self) -> &EntityStore {
        &self.store
    }

    pub fn index(&self) -> &TopicIndex {
        &self.index
    }

    /// Empty the model, emitting the corresponding removal diff. Used when
    /// the remote snapshot store has been cleared and this side must follow.
    pub fn reset(&mut self) -> TopologyDiff {
        let mut diff = TopologyDiff {
            entities_removed: self.store.drain(),
            ..Default::default()
        };
        let mut edges: Vec<Edge> = self
            .emitted
            .drain()
            .flat_map(|(_, set)| set.into_iter())
            .collect();
        edges.sort();
        diff.edges_removed = edges;
        self.index.clear();
        diff
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
