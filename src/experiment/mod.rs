//! Experiment and run organization on disk
//!
//! ## Layout Overview
//!
//! ```text
//! {base}/
//!   exp-{hash(model)}-{hash(training)}/      one folder per experiment
//!     run--{YY-MM-DD--HH-MM}/                one folder per run
//!       hyperparameters.json
//!       training-logs.csv
//!       models/
//!       errors.log
//!       performances.json
//!   debug/                                   shared by every debug run
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use runfolio::experiment::{Configuration, EpochMetrics, ExperimentManager};
//! use runfolio::hooks::{OnEpochEnd, OnTrainBegin, OnTrainEnd};
//! use serde_json::json;
//!
//! let base = tempfile::tempdir().unwrap();
//! let config: Configuration = serde_json::from_value(json!({
//!     "model": {"units": 16},
//!     "training": {"lr": 0.1},
//!     "debug": false,
//! })).unwrap();
//!
//! let mut manager = ExperimentManager::builder().base_dir(base.path()).build();
//! let mut hooks = manager.prepare_with(config).unwrap();
//!
//! hooks.on_train_begin().unwrap();
//! let metrics: EpochMetrics = [("loss".to_string(), 0.3), ("val_loss".to_string(), 0.4)].into();
//! hooks.on_epoch_end(0, &metrics).unwrap();
//! hooks.on_train_end(&metrics).unwrap();
//!
//! assert!(manager.best_performance_path().unwrap().is_file());
//! ```

mod best;
mod checkpoint;
mod fingerprint;
mod identity;
mod layout;
mod manager;
mod metrics_log;

pub use best::{extract_best, write_best, BestRecord, ELAPSED_KEY};
pub use checkpoint::{latest_checkpoint, CheckpointConfig, CheckpointMode, Direction};
pub use fingerprint::{canonical_json, hash8, FINGERPRINT_LEN};
pub use identity::{Configuration, ExperimentId, RunId, RunIdentity};
pub use layout::{
    RunLayout, BEST_PERFORMANCE_FILE, CHECKPOINT_DIR, DEBUG_DIR, ERROR_LOG_FILE,
    METRICS_LOG_FILE, PARAMS_FILE,
};
pub use manager::{
    ExperimentManager, ExperimentManagerBuilder, LifecycleState, PreparedRun, DEBUG_KEY,
    DEFAULT_BASE_DIR, DEFAULT_MONITORED_KEYS, DEFAULT_WATCHED_METRIC,
};
pub use metrics_log::{row_count, EpochMetrics, MetricsLog, EPOCH_COLUMN};
