//! Training Loop Example
//!
//! Drives the run hooks with a simulated training engine: prepares a fresh
//! run, "trains" a few epochs, writes checkpoints where the hooks ask for
//! them, then resumes the same run from its latest checkpoint.
//!
//! Run with: RUST_LOG=info cargo run --example training_loop

use runfolio::experiment::{CheckpointConfig, EpochMetrics, ExperimentManager};
use runfolio::hooks::{HookAction, OnEpochEnd, OnTrainBegin, OnTrainEnd, RunHooks};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[allow(clippy::cast_precision_loss)]
fn train(hooks: &mut RunHooks, epochs: std::ops::Range<usize>) -> anyhow::Result<()> {
    hooks.on_train_begin()?;

    let mut last = EpochMetrics::new();
    for epoch in epochs {
        // Simulate a noisy, decreasing loss
        let loss = 2.0 / (epoch as f64 + 1.0) + 0.05 * (epoch % 3) as f64;
        last = [
            ("loss".to_string(), loss),
            ("val_loss".to_string(), loss * 1.1),
            ("val_acc".to_string(), 1.0 - loss / 2.5),
        ]
        .into();

        match hooks.on_epoch_end(epoch, &last)? {
            HookAction::SaveCheckpoint(path) => {
                std::fs::write(&path, format!("weights@{epoch}"))?;
                println!("   Epoch {epoch}: loss={loss:.4} -> saved {}", path.display());
            }
            HookAction::Continue => println!("   Epoch {epoch}: loss={loss:.4}"),
        }
    }

    hooks.on_train_end(&last)?;
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Runfolio Training Loop ===\n");

    let base = tempfile::tempdir()?;
    let config = json!({
        "model": {"layers": [128, 64], "activation": "relu"},
        "training": {"lr": 0.001, "batch_size": 32, "epochs": 6},
        "seed": 42,
        "debug": false,
    });

    // -------------------------------------------------------------------------
    // 1. Prepare a fresh run
    // -------------------------------------------------------------------------
    println!("1. Preparing run...");

    let mut manager = ExperimentManager::builder()
        .base_dir(base.path())
        .checkpoint(CheckpointConfig::default().monitor("val_loss"))
        .build();
    manager.set_configuration_value(config.clone())?;
    manager.prepare()?;

    let experiment_id = manager.experiment_id()?;
    let run_id = manager.run_id();
    println!("   Experiment: {experiment_id}");
    println!("   Run: {run_id}");

    // -------------------------------------------------------------------------
    // 2. Train
    // -------------------------------------------------------------------------
    println!("\n2. Training...");
    let mut hooks = manager.hooks()?;
    train(&mut hooks, 0..4)?;

    println!(
        "   Best performance:\n   {}",
        std::fs::read_to_string(manager.best_performance_path()?)?
    );

    // -------------------------------------------------------------------------
    // 3. Resume the same run
    // -------------------------------------------------------------------------
    println!("\n3. Resuming...");

    let mut resumed = ExperimentManager::builder().base_dir(base.path()).build();
    let latest = resumed.resume(experiment_id.as_str(), run_id.as_str())?;
    println!("   Latest checkpoint: {}", latest.display());

    resumed.set_configuration_value(config)?;
    resumed.prepare()?;
    let mut hooks = resumed.hooks()?;
    train(&mut hooks, 4..6)?;

    println!(
        "   Metrics log rows: {}",
        runfolio::experiment::row_count(resumed.metrics_log_path()?)?
    );

    println!("\n=== Training Loop Complete ===");
    Ok(())
}
