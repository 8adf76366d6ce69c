//! Benchmarks for the worker-side bridge hot path

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use optrack::bridge::ProgressBridge;
use serde_json::{json, Map};

fn benchmark_update_state(c: &mut Criterion) {
    let bridge = ProgressBridge::new();

    c.bench_function("bridge_update_state", |b| {
        b.iter(|| {
            bridge.update_state(black_box(42.5), black_box("epoch 3/10"), Map::new());
        })
    });
}

fn benchmark_append_metric(c: &mut Criterion) {
    let bridge = ProgressBridge::new();

    c.bench_function("bridge_append_metric", |b| {
        b.iter(|| {
            bridge.append_metric(black_box(json!({"epoch": 3, "loss": 0.42})));
        })
    });
}

fn benchmark_snapshot_read(c: &mut Criterion) {
    let bridge = ProgressBridge::new();
    bridge.update_state(42.5, "epoch 3/10", Map::new());

    c.bench_function("bridge_snapshot", |b| b.iter(|| black_box(bridge.snapshot())));
}

criterion_group!(
    benches,
    benchmark_update_state,
    benchmark_append_metric,
    benchmark_snapshot_read
);
criterion_main!(benches);
