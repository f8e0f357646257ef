//! Run Lifecycle Manager - resolve identity, lay out the run folder, hand out paths
//!
//! ```text
//! Unprepared ──prepare()──> Prepared
//!     │                        ▲
//!     └──resume(exp, run)──────┘ (paths available, identity pinned)
//! ```
//!
//! `prepare` creates `{base}/{experiment}/{run}/models` (idempotently), writes
//! `hyperparameters.json` for fresh runs, and never touches the parameters of
//! a resumed run.

use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde_json::Value;
use tracing::{debug, info};

use super::checkpoint::{latest_checkpoint, CheckpointConfig};
use super::fingerprint::canonical_json_pretty;
use super::identity::{Configuration, ExperimentId, RunId, RunIdentity};
use super::layout::RunLayout;
use crate::hooks::RunHooks;
use crate::{Error, Result};

/// Configuration key of the debug flag.
pub const DEBUG_KEY: &str = "debug";

/// Default base directory for experiment folders.
pub const DEFAULT_BASE_DIR: &str = "experiments";

/// Default metric minimized by the best-performance summary.
pub const DEFAULT_WATCHED_METRIC: &str = "loss";

/// Configuration keys hashed into the experiment id by default.
pub const DEFAULT_MONITORED_KEYS: [&str; 2] = ["model", "training"];

/// Lifecycle of an [`ExperimentManager`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No run folder has been prepared yet.
    Unprepared,
    /// The run folder exists; configuration is frozen.
    Prepared,
}

/// Paths a training engine needs once a run is prepared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRun {
    run_dir: PathBuf,
    metrics_log: PathBuf,
    checkpoint_dir: PathBuf,
    best_performance: PathBuf,
}

impl PreparedRun {
    fn from_layout(layout: &RunLayout) -> Self {
        Self {
            run_dir: layout.run_dir().to_path_buf(),
            metrics_log: layout.metrics_log_path(),
            checkpoint_dir: layout.checkpoint_dir(),
            best_performance: layout.best_performance_path(),
        }
    }

    /// Resolved run folder.
    #[must_use]
    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Metrics log path.
    #[must_use]
    pub fn metrics_log(&self) -> &Path {
        &self.metrics_log
    }

    /// Checkpoint directory.
    #[must_use]
    pub fn checkpoint_dir(&self) -> &Path {
        &self.checkpoint_dir
    }

    /// Best-performance summary path.
    #[must_use]
    pub fn best_performance(&self) -> &Path {
        &self.best_performance
    }
}

/// Sorts training runs into experiment folders.
///
/// Minimal usage:
///
/// ```rust
/// use runfolio::experiment::{Configuration, ExperimentManager};
/// use serde_json::json;
///
/// let base = tempfile::tempdir().unwrap();
/// let config: Configuration = serde_json::from_value(json!({
///     "model": {"units": 64},
///     "training": {"lr": 0.01, "epochs": 5},
///     "debug": false,
/// })).unwrap();
///
/// let mut manager = ExperimentManager::builder().base_dir(base.path()).build();
/// manager.set_configuration(config).unwrap();
/// let run = manager.prepare().unwrap();
///
/// assert!(run.checkpoint_dir().is_dir());
/// assert!(manager.params_path().unwrap().is_file());
/// ```
#[derive(Debug)]
pub struct ExperimentManager {
    base_dir: PathBuf,
    monitored_keys: Vec<String>,
    checkpoint: CheckpointConfig,
    watched_metric: String,
    config: Option<Configuration>,
    resumed: Option<RunIdentity>,
    identity: Option<RunIdentity>,
    layout: Option<RunLayout>,
    state: LifecycleState,
}

impl Default for ExperimentManager {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ExperimentManager {
    /// Manager with default settings (see [`ExperimentManagerBuilder`]).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder to override the defaults.
    #[must_use]
    pub fn builder() -> ExperimentManagerBuilder {
        ExperimentManagerBuilder::default()
    }

    /// Base directory holding experiment folders.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Keys hashed into the experiment id.
    #[must_use]
    pub fn monitored_keys(&self) -> &[String] {
        &self.monitored_keys
    }

    /// Options of the model-checkpoint hook.
    #[must_use]
    pub const fn checkpoint_config(&self) -> &CheckpointConfig {
        &self.checkpoint
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> LifecycleState {
        self.state
    }

    /// True once [`resume`](Self::resume) has succeeded.
    #[must_use]
    pub const fn is_resumed(&self) -> bool {
        self.resumed.is_some()
    }

    /// The stored configuration, if any.
    #[must_use]
    pub const fn configuration(&self) -> Option<&Configuration> {
        self.config.as_ref()
    }

    /// Store the run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyPrepared`] once the run is prepared.
    pub fn set_configuration(&mut self, config: Configuration) -> Result<()> {
        if self.state == LifecycleState::Prepared {
            return Err(Error::AlreadyPrepared);
        }
        self.config = Some(config);
        Ok(())
    }

    /// Store a configuration given as a JSON value.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfiguration`] if `config` is not a JSON object
    /// - [`Error::AlreadyPrepared`] once the run is prepared
    pub fn set_configuration_value(&mut self, config: Value) -> Result<()> {
        match config {
            Value::Object(map) => self.set_configuration(map),
            other => Err(Error::InvalidConfiguration(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    /// Experiment id of this run.
    ///
    /// A resumed or prepared identity is returned verbatim; otherwise the id
    /// is derived from the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConfigured`] if there is no identity and no configuration
    /// - [`Error::MissingKey`] if a monitored key is absent
    pub fn experiment_id(&self) -> Result<ExperimentId> {
        if let Some(identity) = self.pinned_identity() {
            return Ok(identity.experiment_id().clone());
        }
        let config = self.config.as_ref().ok_or(Error::NotConfigured)?;
        ExperimentId::from_config(config, &self.monitored_keys)
    }

    /// Run id of this run: the resumed or prepared one, or a fresh time-based id.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        RunId::resolve(self.pinned_identity().map(|identity| identity.run_id().as_str()))
    }

    /// Resume the run stored in `{base}/{experiment_folder}/{run_folder}`.
    ///
    /// Returns the most recently modified entry of the run's checkpoint
    /// directory. On success the folder names replace hash/time derivation for
    /// the rest of this manager's life and the path accessors become usable.
    ///
    /// # Errors
    ///
    /// - [`Error::AlreadyPrepared`] if the run is already prepared
    /// - [`Error::RunNotFound`] with the exact looked-up path if the run folder is absent
    /// - [`Error::NoCheckpointFound`] if the checkpoint directory is empty or missing
    /// - [`Error::StorageError`] if the run folder cannot be read
    pub fn resume(&mut self, experiment_folder: &str, run_folder: &str) -> Result<PathBuf> {
        if self.state == LifecycleState::Prepared {
            return Err(Error::AlreadyPrepared);
        }

        let identity = RunIdentity::new(ExperimentId::new(experiment_folder), RunId::new(run_folder));
        let layout = RunLayout::new(&self.base_dir, &identity);
        if !layout.run_dir().is_dir() {
            return Err(Error::RunNotFound {
                path: layout.run_dir().to_path_buf(),
            });
        }

        let latest = latest_checkpoint(layout.checkpoint_dir())?;
        info!(checkpoint = %latest.display(), "latest checkpoint found");

        self.layout = Some(canonical_layout(&layout)?);
        self.resumed = Some(identity);
        Ok(latest)
    }

    /// Create the run folder and its checkpoint directory and persist the
    /// configuration of a fresh run.
    ///
    /// `debug: true` sends every run to `{base}/debug` without looking at
    /// identity. Calling `prepare` again reuses the identity of the first call.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConfigured`] if no configuration was set
    /// - [`Error::MissingKey`] if `debug` or a monitored key is absent
    /// - [`Error::InvalidConfiguration`] if `debug` is not a boolean
    /// - [`Error::StorageError`] if a directory or the parameters file cannot be written
    pub fn prepare(&mut self) -> Result<PreparedRun> {
        let config = self.config.as_ref().ok_or(Error::NotConfigured)?;

        let layout = if debug_flag(config)? {
            RunLayout::debug(&self.base_dir)
        } else {
            let identity = match self.identity.as_ref().or(self.resumed.as_ref()) {
                Some(identity) => identity.clone(),
                None => RunIdentity::new(
                    ExperimentId::from_config(config, &self.monitored_keys)?,
                    RunId::generate(),
                ),
            };
            debug!(
                experiment_id = %identity.experiment_id(),
                run_id = %identity.run_id(),
                resumed = self.resumed.is_some(),
                "run identity resolved"
            );
            let layout = RunLayout::new(&self.base_dir, &identity);
            self.identity = Some(identity);
            layout
        };

        create_dir(layout.run_dir())?;
        let layout = canonical_layout(&layout)?;
        info!(run_path = %layout.run_dir().display(), "now everything is happening in run folder");

        create_dir(&layout.checkpoint_dir())?;
        if self.resumed.is_none() {
            write_parameters(&layout.params_path(), config)?;
        }

        let prepared = PreparedRun::from_layout(&layout);
        self.layout = Some(layout);
        self.state = LifecycleState::Prepared;
        Ok(prepared)
    }

    /// Set `config`, prepare the run and return its hooks in one call.
    ///
    /// # Errors
    ///
    /// See [`set_configuration`](Self::set_configuration) and [`prepare`](Self::prepare).
    pub fn prepare_with(&mut self, config: Configuration) -> Result<RunHooks> {
        self.set_configuration(config)?;
        self.prepare()?;
        self.hooks()
    }

    /// Hooks wired to this run's artifact paths.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] before `prepare` or `resume`.
    pub fn hooks(&self) -> Result<RunHooks> {
        Ok(RunHooks::new(
            self.layout()?,
            self.checkpoint.clone(),
            &self.watched_metric,
        ))
    }

    /// Append a timestamped line to the run's error log.
    ///
    /// # Errors
    ///
    /// - [`Error::NotPrepared`] before `prepare` or `resume`
    /// - [`Error::StorageError`] if the log cannot be written
    pub fn log_error(&self, error: &dyn fmt::Display) -> Result<()> {
        let path = self.error_log_path()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::storage(&path, e))?;
        writeln!(file, "{} {error}", Local::now().format("%Y-%m-%d %H:%M:%S"))
            .map_err(|e| Error::storage(&path, e))
    }

    /// Resolved run folder.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] before `prepare` or `resume`.
    pub fn run_path(&self) -> Result<&Path> {
        Ok(self.layout()?.run_dir())
    }

    /// Parameters file path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] before `prepare` or `resume`.
    pub fn params_path(&self) -> Result<PathBuf> {
        Ok(self.layout()?.params_path())
    }

    /// Metrics log path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] before `prepare` or `resume`.
    pub fn metrics_log_path(&self) -> Result<PathBuf> {
        Ok(self.layout()?.metrics_log_path())
    }

    /// Checkpoint directory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] before `prepare` or `resume`.
    pub fn checkpoint_dir(&self) -> Result<PathBuf> {
        Ok(self.layout()?.checkpoint_dir())
    }

    /// Error log path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] before `prepare` or `resume`.
    pub fn error_log_path(&self) -> Result<PathBuf> {
        Ok(self.layout()?.error_log_path())
    }

    /// Best-performance summary path.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotPrepared`] before `prepare` or `resume`.
    pub fn best_performance_path(&self) -> Result<PathBuf> {
        Ok(self.layout()?.best_performance_path())
    }

    fn layout(&self) -> Result<&RunLayout> {
        self.layout.as_ref().ok_or(Error::NotPrepared)
    }

    fn pinned_identity(&self) -> Option<&RunIdentity> {
        self.identity.as_ref().or(self.resumed.as_ref())
    }
}

fn debug_flag(config: &Configuration) -> Result<bool> {
    match config.get(DEBUG_KEY) {
        Some(Value::Bool(flag)) => Ok(*flag),
        Some(other) => Err(Error::InvalidConfiguration(format!(
            "'{DEBUG_KEY}' must be a boolean, got {other}"
        ))),
        None => Err(Error::MissingKey(DEBUG_KEY.to_string())),
    }
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| Error::storage(path, e))
}

fn canonical_layout(layout: &RunLayout) -> Result<RunLayout> {
    let run_dir = layout.run_dir();
    let resolved = fs::canonicalize(run_dir).map_err(|e| Error::storage(run_dir, e))?;
    Ok(RunLayout::from_run_dir(resolved))
}

fn write_parameters(path: &Path, config: &Configuration) -> Result<()> {
    let json = canonical_json_pretty(&Value::Object(config.clone()))?;
    fs::write(path, json).map_err(|e| Error::storage(path, e))
}

/// Builder for [`ExperimentManager`].
#[derive(Debug)]
pub struct ExperimentManagerBuilder {
    base_dir: PathBuf,
    monitored_keys: Vec<String>,
    checkpoint: CheckpointConfig,
    watched_metric: String,
}

impl Default for ExperimentManagerBuilder {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from(DEFAULT_BASE_DIR),
            monitored_keys: DEFAULT_MONITORED_KEYS.iter().map(ToString::to_string).collect(),
            checkpoint: CheckpointConfig::default(),
            watched_metric: DEFAULT_WATCHED_METRIC.to_string(),
        }
    }
}

impl ExperimentManagerBuilder {
    /// Directory holding experiment folders (default `experiments`).
    #[must_use]
    pub fn base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    /// Configuration keys hashed into the experiment id
    /// (default `["model", "training"]`).
    #[must_use]
    pub fn monitored_keys<I, K>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        self.monitored_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Options of the model-checkpoint hook (default `{auto, val_loss}`).
    #[must_use]
    pub fn checkpoint(mut self, checkpoint: CheckpointConfig) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    /// Metric minimized by the best-performance summary (default `loss`).
    #[must_use]
    pub fn watched_metric(mut self, metric: impl Into<String>) -> Self {
        self.watched_metric = metric.into();
        self
    }

    /// Build the manager.
    #[must_use]
    pub fn build(self) -> ExperimentManager {
        ExperimentManager {
            base_dir: self.base_dir,
            monitored_keys: self.monitored_keys,
            checkpoint: self.checkpoint,
            watched_metric: self.watched_metric,
            config: None,
            resumed: None,
            identity: None,
            layout: None,
            state: LifecycleState::Unprepared,
        }
    }
}
