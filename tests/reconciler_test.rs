//! Integration tests for the topology engine: the lifecycle scenarios the
//! daemon sees in practice, plus equivalence properties of the incremental
//! edge derivation.

use std::collections::BTreeSet;

use meshd::topology::model::{Edge, EntityKind, EventRecord, TopologyGraph};
use meshd::topology::reconciler::Reconciler;
use meshd::topology::snapshot;
use proptest::prelude::*;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn record(cmd: &str, id: &str, parent: Option<&str>, topic: Option<&str>) -> EventRecord {
    let mut r = EventRecord::new(cmd, id);
    r.parent = parent.map(str::to_string);
    r.topic = topic.map(str::to_string);
    r
}

/// Apply a record, folding its edge diff into the cumulative emitted set the
/// way a rendering client would.
fn apply_tracking(reconciler: &mut Reconciler, emitted: &mut BTreeSet<Edge>, r: &EventRecord) {
    if let Ok(diff) = reconciler.apply(r) {
        for edge in diff.edges_added {
            emitted.insert(edge);
        }
        for edge in &diff.edges_removed {
            emitted.remove(edge);
        }
    }
}

/// From-scratch recomputation over the final entity store: every publisher
/// crossed with every subscriber sharing its topic.
fn brute_force_edges(reconciler: &Reconciler) -> BTreeSet<Edge> {
    let publishers = reconciler.store().list(Some(EntityKind::Publisher));
    let subscribers = reconciler.store().list(Some(EntityKind::Subscriber));
    let mut edges = BTreeSet::new();
    for p in &publishers {
        for s in &subscribers {
            if p.topic.is_some() && p.topic == s.topic {
                edges.insert(Edge::new(p.id.clone(), s.id.clone()));
            }
        }
    }
    edges
}

fn graph_edges(graph: &TopologyGraph) -> BTreeSet<Edge> {
    graph.edges.iter().cloned().collect()
}

// ─── Lifecycle scenarios ──────────────────────────────────────────────────────

#[test]
fn publisher_and_subscriber_on_one_topic_connect_and_disconnect() {
    let mut r = Reconciler::new();
    r.apply(&record("rt-start", "R1", None, None)).unwrap();
    r.apply(&record("module-inst", "M1", Some("R1"), None))
        .unwrap();
    r.apply(&record("pub-start", "P1", Some("M1"), Some("t")))
        .unwrap();

    let diff = r
        .apply(&record("sub-start", "S1", Some("M1"), Some("t")))
        .unwrap();
    assert_eq!(diff.edges_added, vec![Edge::new("P1", "S1")]);

    // Stopping the publisher removes the edge but leaves the subscriber.
    let diff = r.apply(&record("pub-stop", "P1", None, None)).unwrap();
    assert_eq!(diff.edges_removed, vec![Edge::new("P1", "S1")]);
    assert!(r.store().get("S1").is_some());
    assert_eq!(r.index().publisher_count("t"), 0);
    assert_eq!(r.index().subscriber_count("t"), 1);
}

#[test]
fn one_publisher_fans_out_to_two_subscribers() {
    let mut r = Reconciler::new();
    r.apply(&record("sub-start", "S1", None, Some("t"))).unwrap();
    r.apply(&record("sub-start", "S2", None, Some("t"))).unwrap();

    let diff = r.apply(&record("pub-start", "P1", None, Some("t"))).unwrap();
    let added: BTreeSet<Edge> = diff.edges_added.into_iter().collect();
    assert_eq!(added.len(), 2);
    assert!(added.contains(&Edge::new("P1", "S1")));
    assert!(added.contains(&Edge::new("P1", "S2")));
}

#[test]
fn idempotent_add_keeps_one_entity_and_one_binding() {
    let mut r = Reconciler::new();
    let start = record("pub-start", "P1", None, Some("t"));
    r.apply(&start).unwrap();
    r.apply(&start).unwrap();

    assert_eq!(r.store().len(), 1);
    assert_eq!(r.index().publisher_count("t"), 1);
}

#[test]
fn interleaved_starts_and_stops_keep_edges_exact() {
    let mut r = Reconciler::new();
    let mut emitted = BTreeSet::new();

    let script = [
        record("pub-start", "P1", None, Some("a")),
        record("sub-start", "S1", None, Some("a")),
        record("pub-start", "P2", None, Some("b")),
        record("sub-start", "S2", None, Some("b")),
        record("sub-start", "S3", None, Some("a")),
        record("pub-stop", "P2", None, None),
        record("pub-start", "P2", None, Some("a")),
        record("sub-stop", "S1", None, None),
        record("sub-stop", "S1", None, None), // redundant
        record("pub-start", "P1", None, Some("b")), // topic change
    ];
    for event in &script {
        apply_tracking(&mut r, &mut emitted, event);
        assert_eq!(emitted, brute_force_edges(&r));
        assert_eq!(emitted, graph_edges(&r.graph()));
    }
}

// ─── Snapshot-then-live equivalence ───────────────────────────────────────────

#[test]
fn snapshot_then_live_matches_one_ordered_stream() {
    let stream = [
        record("rt-start", "R1", None, None),
        record("module-inst", "M1", Some("R1"), None),
        record("pub-start", "P1", Some("M1"), Some("t")),
        record("sub-start", "S1", Some("M1"), Some("t")),
        record("sub-start", "S2", Some("M1"), Some("t")),
        record("pub-stop", "P1", None, None),
        record("pub-start", "P2", Some("M1"), Some("t")),
    ];

    for split in 0..=stream.len() {
        // Path A: first `split` records replayed as a snapshot, rest live.
        let mut a = Reconciler::new();
        let mut emitted = BTreeSet::new();
        let diff = snapshot::load(&mut a, &stream[..split]);
        emitted.extend(diff.edges_added);
        for edge in &diff.edges_removed {
            emitted.remove(edge);
        }
        for event in &stream[split..] {
            apply_tracking(&mut a, &mut emitted, event);
        }

        // Path B: the whole stream applied live, one at a time.
        let mut b = Reconciler::new();
        for event in &stream {
            b.apply(event).unwrap();
        }

        let graph_a = a.graph();
        let graph_b = b.graph();
        assert_eq!(graph_a.nodes, graph_b.nodes, "split at {split}");
        assert_eq!(graph_a.edges, graph_b.edges, "split at {split}");
        assert_eq!(emitted, graph_edges(&graph_b), "split at {split}");
    }
}

// ─── Property: incremental ≡ brute force ──────────────────────────────────────

/// Random event scripts over a small id/topic universe, including duplicate
/// adds, redundant stops, topic moves, and cascading runtime stops.
fn arb_record() -> impl Strategy<Value = EventRecord> {
    let cmds = prop_oneof![
        Just("rt-start"),
        Just("rt-stop"),
        Just("module-inst"),
        Just("module-uninst"),
        Just("pub-start"),
        Just("pub-stop"),
        Just("sub-start"),
        Just("sub-stop"),
    ];
    (cmds, 0..3usize, 0..3usize).prop_map(|(cmd, slot, topic)| {
        let (id, parent) = match cmd {
            "rt-start" | "rt-stop" => (format!("R{slot}"), None),
            "module-inst" | "module-uninst" => (format!("M{slot}"), Some(format!("R{slot}"))),
            "pub-start" | "pub-stop" => (format!("P{slot}"), Some(format!("M{slot}"))),
            _ => (format!("S{slot}"), Some(format!("M{slot}"))),
        };
        let mut r = EventRecord::new(cmd, id);
        r.parent = parent;
        if cmd == "pub-start" || cmd == "sub-start" {
            r.topic = Some(format!("t{topic}"));
        }
        r
    })
}

proptest! {
    #[test]
    fn incremental_edges_match_brute_force(script in proptest::collection::vec(arb_record(), 0..80)) {
        let mut r = Reconciler::new();
        let mut emitted = BTreeSet::new();
        for event in &script {
            apply_tracking(&mut r, &mut emitted, event);
            prop_assert_eq!(&emitted, &brute_force_edges(&r));
            prop_assert_eq!(&emitted, &graph_edges(&r.graph()));
        }
    }
}
