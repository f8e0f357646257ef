//! Error types for runfolio
//!
//! Every failure is terminal for the operation that raised it: identity and
//! storage errors are surfaced to the operator instead of being retried, so a
//! run never silently trains into the wrong folder.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Runfolio error types
#[derive(Error, Debug)]
pub enum Error {
    /// The configuration does not contain a key the identity depends on
    #[error("Configuration is missing key '{0}'")]
    MissingKey(String),

    /// The configuration is present but unusable (wrong shape or type)
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Resumption target does not exist
    #[error("Run not found: {}\nCheck the experiment and run folder names", path.display())]
    RunNotFound {
        /// The `{base}/{experiment}/{run}` path that was looked up
        path: PathBuf,
    },

    /// Resumption target exists but holds no checkpoint
    #[error("No checkpoint found in {}", path.display())]
    NoCheckpointFound {
        /// The checkpoint directory that was scanned
        path: PathBuf,
    },

    /// `prepare` was called before `set_configuration`
    #[error("Experiment manager is not configured: call set_configuration before prepare")]
    NotConfigured,

    /// A path accessor was used before `prepare` or `resume`
    #[error("Run is not prepared: call prepare or resume first")]
    NotPrepared,

    /// The configuration cannot change once the run is prepared
    #[error("Run is already prepared: configuration is immutable")]
    AlreadyPrepared,

    /// Filesystem operation on the run tree failed
    #[error("Storage error at {}: {source}", path.display())]
    StorageError {
        /// Path the failing operation targeted
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The metrics log holds a header but no rows
    #[error("Metrics log {} has no rows", path.display())]
    EmptyLog {
        /// Metrics log path
        path: PathBuf,
    },

    /// The watched metric is not a column of the metrics log
    #[error("Metrics log has no column '{column}'")]
    MissingColumn {
        /// Requested column name
        column: String,
    },

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Arrow error while reading the metrics log
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// CSV error while reading or appending the metrics log
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    /// Wrap an I/O failure with the path it happened on.
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StorageError {
            path: path.into(),
            source,
        }
    }
}
