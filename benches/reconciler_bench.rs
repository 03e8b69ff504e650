//! Criterion benchmarks for hot paths in the meshd topology engine.
//!
//! Run with:
//!   cargo bench
//!
//! Covers:
//!   - event record parsing (serde_json)
//!   - a single endpoint add on a populated model (topic-local recompute)
//!   - a full snapshot replay

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use meshd::topology::model::EventRecord;
use meshd::topology::reconciler::Reconciler;
use meshd::topology::snapshot;

static PUB_START: &str = r#"{
    "cmd": "pub-start",
    "id": "PubA#M1#R1",
    "label": "PubA",
    "parent": "M1#R1",
    "topic": "sensors/temperature"
}"#;

fn record(cmd: &str, id: &str, parent: Option<&str>, topic: Option<&str>) -> EventRecord {
    let mut r = EventRecord::new(cmd, id);
    r.parent = parent.map(str::to_string);
    r.topic = topic.map(str::to_string);
    r
}

/// A mesh with `runtimes` runtimes, one module each, and one pub + one sub
/// per module spread over eight topics.
fn mesh_records(runtimes: usize) -> Vec<EventRecord> {
    let mut records = Vec::new();
    for i in 0..runtimes {
        let rt = format!("R{i}");
        let module = format!("M{i}");
        let topic = format!("t{}", i % 8);
        records.push(record("rt-start", &rt, None, None));
        records.push(record("module-inst", &module, Some(&rt), None));
        records.push(record("pub-start", &format!("P{i}"), Some(&module), Some(&topic)));
        records.push(record("sub-start", &format!("S{i}"), Some(&module), Some(&topic)));
    }
    records
}

fn bench_record_parse(c: &mut Criterion) {
    c.bench_function("record_parse_pub_start", |b| {
        b.iter(|| {
            let r: EventRecord = serde_json::from_str(black_box(PUB_START)).unwrap();
            black_box(r);
        });
    });
}

fn bench_apply_on_populated_model(c: &mut Criterion) {
    let mut reconciler = Reconciler::new();
    snapshot::load(&mut reconciler, &mesh_records(200));
    let start = record("sub-start", "S-bench", Some("M0"), Some("t0"));
    let stop = record("sub-stop", "S-bench", None, None);

    c.bench_function("apply_endpoint_add_remove_200_runtimes", |b| {
        b.iter(|| {
            black_box(reconciler.apply(black_box(&start)).unwrap());
            black_box(reconciler.apply(black_box(&stop)).unwrap());
        });
    });
}

fn bench_snapshot_replay(c: &mut Criterion) {
    let records = mesh_records(100);
    c.bench_function("snapshot_replay_100_runtimes", |b| {
        b.iter(|| {
            let mut reconciler = Reconciler::new();
            black_box(snapshot::load(&mut reconciler, black_box(&records)));
        });
    });
}

criterion_group!(
    benches,
    bench_record_parse,
    bench_apply_on_populated_model,
    bench_snapshot_replay
);
criterion_main!(benches);
