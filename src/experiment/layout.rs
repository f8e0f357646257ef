//! Path Layout - artifact paths of a run folder
//!
//! ```text
//! {base}/{experiment_id}/{run_id}/
//!     hyperparameters.json   parameters file (fresh runs only)
//!     training-logs.csv      metrics log, one row per epoch
//!     models/                checkpoints
//!     errors.log             error log
//!     performances.json      best-performance summary
//! ```
//!
//! Debug runs skip identity and all share `{base}/debug`.

use std::path::{Path, PathBuf};

use super::identity::RunIdentity;

/// Folder shared by every debug run.
pub const DEBUG_DIR: &str = "debug";
/// Parameters file name.
pub const PARAMS_FILE: &str = "hyperparameters.json";
/// Metrics log file name.
pub const METRICS_LOG_FILE: &str = "training-logs.csv";
/// Checkpoint directory name.
pub const CHECKPOINT_DIR: &str = "models";
/// Error log file name.
pub const ERROR_LOG_FILE: &str = "errors.log";
/// Best-performance summary file name.
pub const BEST_PERFORMANCE_FILE: &str = "performances.json";

/// Artifact paths of one run folder. Pure path arithmetic, no I/O.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    run_dir: PathBuf,
}

impl RunLayout {
    /// Layout of `{base}/{experiment_id}/{run_id}`.
    #[must_use]
    pub fn new(base: impl AsRef<Path>, identity: &RunIdentity) -> Self {
        Self {
            run_dir: base
                .as_ref()
                .join(identity.experiment_id().as_str())
                .join(identity.run_id().as_str()),
        }
    }

    /// Layout of the shared `{base}/debug` folder.
    #[must_use]
    pub fn debug(base: impl AsRef<Path>) -> Self {
        Self {
            run_dir: base.as_ref().join(DEBUG_DIR),
        }
    }

    /// Pick the debug layout when `debug` is set, the identity layout otherwise.
    #[must_use]
    pub fn resolve(base: impl AsRef<Path>, identity: &RunIdentity, debug: bool) -> Self {
        if debug {
            Self::debug(base)
        } else {
            Self::new(base, identity)
        }
    }

    /// Layout rooted at an already-resolved run folder.
    #[must_use]
    pub fn from_run_dir(run_dir: impl Into<PathBuf>) -> Self {
        Self {
            run_dir: run_dir.into(),
        }
    }

    /// The run folder itself.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// `hyperparameters.json`
    #[must_use]
    pub fn params_path(&self) -> PathBuf {
        self.run_dir.join(PARAMS_FILE)
    }

    /// `training-logs.csv`
    #[must_use]
    pub fn metrics_log_path(&self) -> PathBuf {
        self.run_dir.join(METRICS_LOG_FILE)
    }

    /// `models/`
    #[must_use]
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.run_dir.join(CHECKPOINT_DIR)
    }

    /// `errors.log`
    #[must_use]
    pub fn error_log_path(&self) -> PathBuf {
        self.run_dir.join(ERROR_LOG_FILE)
    }

    /// `performances.json`
    #[must_use]
    pub fn best_performance_path(&self) -> PathBuf {
        self.run_dir.join(BEST_PERFORMANCE_FILE)
    }
}
