//! Fingerprint benchmarks
//!
//! Measures experiment-id derivation for small and large configurations:
//! - `hash8` on a single monitored value
//! - `ExperimentId::from_config` over two monitored keys
//! - metrics-log reduction with `extract_best`
//!
//! Run with: cargo bench --bench fingerprint

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use runfolio::experiment::{extract_best, hash8, Configuration, ExperimentId};
use serde_json::{json, Value};
use std::fmt::Write;

const SMALL_LAYERS: usize = 4;
const LARGE_LAYERS: usize = 1_000;

/// Model section with `layers` nested layer descriptions
fn model_section(layers: usize) -> Value {
    let layers: Vec<Value> = (0..layers)
        .map(|i| json!({"units": 64 + i, "activation": "relu", "dropout": 0.1}))
        .collect();
    json!({"name": "mlp", "layers": layers})
}

fn bench_hash8(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash8");

    for layers in [SMALL_LAYERS, LARGE_LAYERS] {
        let model = model_section(layers);
        group.bench_with_input(BenchmarkId::new("model_section", layers), &model, |b, model| {
            b.iter(|| hash8(black_box(model)).unwrap());
        });
    }

    group.finish();
}

fn bench_experiment_id(c: &mut Criterion) {
    let config: Configuration = serde_json::from_value(json!({
        "model": model_section(SMALL_LAYERS),
        "training": {"lr": 0.001, "epochs": 20, "optimizer": "adam"},
        "debug": false,
    }))
    .unwrap();

    c.bench_function("experiment_id_two_keys", |b| {
        b.iter(|| ExperimentId::from_config(black_box(&config), &["model", "training"]).unwrap());
    });
}

#[allow(clippy::cast_precision_loss)]
fn bench_extract_best(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("training-logs.csv");

    let mut csv = String::from("epoch,loss,val_loss\n");
    for epoch in 0..10_000 {
        let loss = 1.0 / (epoch as f64 + 1.0);
        writeln!(csv, "{epoch},{loss},{}", loss * 1.1).unwrap();
    }
    std::fs::write(&path, csv).unwrap();

    c.bench_function("extract_best_10k_epochs", |b| {
        b.iter(|| extract_best(black_box(&path), "val_loss", 1.0).unwrap());
    });
}

criterion_group!(benches, bench_hash8, bench_experiment_id, bench_extract_best);
criterion_main!(benches);
