// SPDX-License-Identifier: MIT
// In-memory entity store — the single source of truth for what exists now.

use std::collections::HashMap;

use super::model::{Entity, EntityKind};

/// Outcome of an upsert. A replace hands back the displaced entity so the
/// caller can undo its index bindings.
#[derive(Debug, Clone, PartialEq)]
pub enum Upsert {
    Inserted,
    Replaced(Entity),
}

/// Keyed by entity id; ids are unique at any instant. Re-adding an existing
/// id overwrites, never duplicates.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: HashMap<String, Entity>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Mutation ──────────────────────────────────────────────────────────────

    /// Insert or replace the entity keyed by its id.
    pub fn upsert(&mut self, entity: Entity) -> Upsert {
        match self.entities.insert(entity.id.clone(), entity) {
            None => Upsert::Inserted,
            Some(previous) => Upsert::Replaced(previous),
        }
    }

    /// Delete and return the entity, if present. Removing an unknown id is a
    /// no-op — the event source delivers at-least-once, so redundant removes
    /// are expected.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }

    /// Empty the store, returning what was held (sorted by id).
    pub fn drain(&mut self) -> Vec<Entity> {
        let mut drained: Vec<Entity> = self.entities.drain().map(|(_, e)| e).collect();
        drained.sort_by(|a, b| a.id.cmp(&b.id));
        drained
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// All entities, optionally filtered by kind, sorted by id for
    /// deterministic output.
    pub fn list(&self, kind: Option<EntityKind>) -> Vec<&Entity> {
        let mut entities: Vec<&Entity> = self
            .entities
            .values()
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .collect();
        entities.sort_by(|a, b| a.id.cmp(&b.id));
        entities
    }

    /// Ids of every entity below `id` in the parent hierarchy. The hierarchy
    /// is a forest, so the walk terminates without a visited set.
    pub fn descendants_of(&self, id: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        let mut frontier: Vec<String> = vec![id.to_string()];
        while let Some(current) = frontier.pop() {
            for entity in self.entities.values() {
                if entity.parent.as_deref() == Some(current.as_str()) {
                    found.push(entity.id.clone());
                    frontier.push(entity.id.clone());
                }
            }
        }
        found.sort();
        found
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
