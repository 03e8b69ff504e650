// SPDX-License-Identifier: MIT
// Topic index — topic name → publisher/subscriber id sets.
//
// Keying by topic bounds each update to the one affected topic: O(p + s)
// set maintenance plus the O(p·s) cross product for that topic, instead of
// rescanning every publisher against every subscriber on each change.

use std::collections::{BTreeSet, HashMap};

use super::model::{Edge, Entity, EntityKind};

#[derive(Debug, Default)]
struct TopicSets {
    publishers: BTreeSet<String>,
    subscribers: BTreeSet<String>,
}

impl TopicSets {
    fn is_empty(&self) -> bool {
        self.publishers.is_empty() && self.subscribers.is_empty()
    }
}

/// Per-topic endpoint sets for the current entity population. Ordered sets
/// keep derived edge sets deterministic.
#[derive(Debug, Default)]
pub struct TopicIndex {
    topics: HashMap<String, TopicSets>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a Publisher/Subscriber to its topic's set. Non-endpoint entities
    /// and endpoints without a topic are ignored — they can never form edges.
    pub fn bind(&mut self, entity: &Entity) {
        if !entity.kind.is_endpoint() {
            return;
        }
        let Some(topic) = entity.topic.as_deref() else {
            return;
        };
        let sets = self.topics.entry(topic.to_string()).or_default();
        if entity.kind == EntityKind::Publisher {
            sets.publishers.insert(entity.id.clone());
        } else {
            sets.subscribers.insert(entity.id.clone());
        }
    }

    /// Remove the entity from its topic's set; drops the topic entry once
    /// both sets are empty.
    pub fn unbind(&mut self, entity: &Entity) {
        let Some(topic) = entity.topic.as_deref() else {
            return;
        };
        if let Some(sets) = self.topics.get_mut(topic) {
            match entity.kind {
                EntityKind::Publisher => {
                    sets.publishers.remove(&entity.id);
                }
                EntityKind::Subscriber => {
                    sets.subscribers.remove(&entity.id);
                }
                _ => {}
            }
            if sets.is_empty() {
                self.topics.remove(topic);
            }
        }
    }

    /// The complete, current edge set for a topic: the cross product of its
    /// publisher and subscriber sets.
    pub fn edges_for(&self, topic: &str) -> BTreeSet<Edge> {
        let mut edges = BTreeSet::new();
        if let Some(sets) = self.topics.get(topic) {
            for publisher in &sets.publishers {
                for subscriber in &sets.subscribers {
                    edges.insert(Edge::new(publisher.clone(), subscriber.clone()));
                }
            }
        }
        edges
    }

    pub fn publisher_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |s| s.publishers.len())
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.get(topic).map_or(0, |s| s.subscribers.len())
    }

    pub fn clear(&mut self) {
        self.topics.clear();
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
