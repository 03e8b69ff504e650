// SPDX-License-Identifier: MIT
// Topology data model.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EventError;

// ─── EntityKind ──────────────────────────────────────────────────────────────

/// What a topology node is.
///
/// The wire names match the `type` values rendering clients style nodes by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Top-level hosting process; root of a hierarchy.
    #[serde(rename = "runtime")]
    Runtime,
    /// A unit of code loaded inside a runtime.
    #[serde(rename = "module")]
    Module,
    /// An endpoint publishing on a named topic.
    #[serde(rename = "pub")]
    Publisher,
    /// An endpoint subscribed to a named topic.
    #[serde(rename = "sub")]
    Subscriber,
}

impl EntityKind {
    /// Canonical string used on the wire and in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Runtime => "runtime",
            EntityKind::Module => "module",
            EntityKind::Publisher => "pub",
            EntityKind::Subscriber => "sub",
        }
    }

    /// Publisher/Subscriber entities are the only ones that participate in
    /// the topic index.
    pub fn is_endpoint(&self) -> bool {
        matches!(self, EntityKind::Publisher | EntityKind::Subscriber)
    }
}

// ─── Command classification ──────────────────────────────────────────────────

/// Whether an event adds or removes its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    Add,
    Remove,
}

/// Map a wire `cmd` onto its `(kind, action)` pair.
pub fn classify(cmd: &str) -> Result<(EntityKind, EventAction), EventError> {
    match cmd {
        "rt-start" => Ok((EntityKind::Runtime, EventAction::Add)),
        "rt-stop" => Ok((EntityKind::Runtime, EventAction::Remove)),
        "module-inst" => Ok((EntityKind::Module, EventAction::Add)),
        "module-uninst" => Ok((EntityKind::Module, EventAction::Remove)),
        "pub-start" => Ok((EntityKind::Publisher, EventAction::Add)),
        "pub-stop" => Ok((EntityKind::Publisher, EventAction::Remove)),
        "sub-start" => Ok((EntityKind::Subscriber, EventAction::Add)),
        "sub-stop" => Ok((EntityKind::Subscriber, EventAction::Remove)),
        other => Err(EventError::UnrecognizedCommand(other.to_string())),
    }
}

// ─── EventRecord ─────────────────────────────────────────────────────────────

/// One lifecycle event or snapshot record — both share this wire shape.
///
/// Fields the engine does not interpret (runtime address/port and anything
/// else the source attaches) are carried through `attrs` verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub cmd: String,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl EventRecord {
    pub fn new(cmd: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            cmd: cmd.into(),
            id: id.into(),
            label: None,
            parent: None,
            topic: None,
            attrs: Map::new(),
        }
    }

    /// The remove-runtime command published when an operator requests that a
    /// runtime shut down.
    pub fn runtime_stop(id: impl Into<String>) -> Self {
        Self::new("rt-stop", id)
    }
}

// ─── Entity ──────────────────────────────────────────────────────────────────

/// A node in the topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    /// Opaque payload stored and forwarded, never interpreted here.
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl Entity {
    /// Build an entity from an Add record. A missing label falls back to the id.
    pub fn from_record(kind: EntityKind, record: &EventRecord) -> Entity {
        Entity {
            id: record.id.clone(),
            kind,
            label: record
                .label
                .clone()
                .unwrap_or_else(|| record.id.clone()),
            parent: record.parent.clone(),
            topic: record.topic.clone(),
            attrs: record.attrs.clone(),
        }
    }

    /// Read a string attribute from the opaque payload.
    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).and_then(Value::as_str)
    }
}

// ─── Edge ────────────────────────────────────────────────────────────────────

/// A derived publisher → subscriber connection. Identity is the ordered id
/// pair; edges carry no lifecycle of their own.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "source")]
    pub publisher: String,
    #[serde(rename = "target")]
    pub subscriber: String,
}

impl Edge {
    pub fn new(publisher: impl Into<String>, subscriber: impl Into<String>) -> Self {
        Self {
            publisher: publisher.into(),
            subscriber: subscriber.into(),
        }
    }

    /// Deterministic edge id, reproducible from the endpoint pair alone.
    pub fn id(&self) -> String {
        format!("{}-{}", self.publisher, self.subscriber)
    }
}

// ─── TopologyDiff ────────────────────────────────────────────────────────────

/// The add/remove summary emitted to rendering clients after each applied
/// event (or once for a whole snapshot replay).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopologyDiff {
    pub entities_added: Vec<Entity>,
    pub entities_removed: Vec<Entity>,
    pub edges_added: Vec<Edge>,
    pub edges_removed: Vec<Edge>,
}

impl TopologyDiff {
    pub fn is_empty(&self) -> bool {
        self.entities_added.is_empty()
            && self.entities_removed.is_empty()
            && self.edges_added.is_empty()
            && self.edges_removed.is_empty()
    }

    /// Append another diff, preserving order of application.
    pub fn merge(&mut self, other: TopologyDiff) {
        self.entities_added.extend(other.entities_added);
        self.entities_removed.extend(other.entities_removed);
        self.edges_added.extend(other.edges_added);
        self.edges_removed.extend(other.edges_removed);
    }
}

// ─── TopologyGraph ───────────────────────────────────────────────────────────

/// The full current graph, served to clients that (re)sync from scratch.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopologyGraph {
    pub nodes: Vec<Entity>,
    pub edges: Vec<Edge>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
