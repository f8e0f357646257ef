//! Training-loop hooks
//!
//! A training engine drives these at three fixed points: before the first
//! epoch, after every epoch, and after the last epoch. The engine stays an
//! external collaborator; it only needs to call the capability traits below.
//!
//! [`RunHooks`] bundles the three hooks a prepared run hands out:
//!
//! - [`CsvLoggerHook`] appends each epoch's metrics to `training-logs.csv`
//! - [`ModelCheckpointHook`] tells the engine when and where to save a checkpoint
//! - [`BestPerformanceHook`] writes `performances.json` when training ends

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{info, warn};

use crate::experiment::{write_best, CheckpointConfig, EpochMetrics, MetricsLog, RunLayout};
use crate::Result;

/// What the engine should do after an epoch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Nothing to do.
    Continue,
    /// Save the model to this path.
    SaveCheckpoint(PathBuf),
}

/// Hook invoked once before the first epoch.
pub trait OnTrainBegin {
    /// Training is about to start.
    ///
    /// # Errors
    ///
    /// Implementation-specific; errors abort the run.
    fn on_train_begin(&mut self) -> Result<()>;
}

/// Hook invoked after every epoch with that epoch's metrics.
pub trait OnEpochEnd {
    /// Epoch `epoch` (zero-based) finished with `metrics`.
    ///
    /// # Errors
    ///
    /// Implementation-specific; errors abort the run.
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> Result<HookAction>;
}

/// Hook invoked once after the last epoch.
pub trait OnTrainEnd {
    /// Training finished; `metrics` are the last epoch's metrics.
    ///
    /// # Errors
    ///
    /// Implementation-specific; errors abort the run.
    fn on_train_end(&mut self, metrics: &EpochMetrics) -> Result<()>;
}

/// Appends one metrics-log row per epoch.
#[derive(Debug)]
pub struct CsvLoggerHook {
    path: PathBuf,
    log: Option<MetricsLog>,
}

impl CsvLoggerHook {
    /// Log to `path`, appending if it already has rows.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            log: None,
        }
    }

    /// Metrics log path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn log(&mut self) -> Result<&mut MetricsLog> {
        let log = match &mut self.log {
            Some(log) => log,
            slot => slot.insert(MetricsLog::open(&self.path)?),
        };
        Ok(log)
    }
}

impl OnTrainBegin for CsvLoggerHook {
    fn on_train_begin(&mut self) -> Result<()> {
        self.log = Some(MetricsLog::open(&self.path)?);
        Ok(())
    }
}

impl OnEpochEnd for CsvLoggerHook {
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> Result<HookAction> {
        self.log()?.append(epoch, metrics)?;
        Ok(HookAction::Continue)
    }
}

/// Decides after each epoch whether the engine should write a checkpoint.
#[derive(Debug, Clone)]
pub struct ModelCheckpointHook {
    config: CheckpointConfig,
    dir: PathBuf,
    best: Option<f64>,
}

impl ModelCheckpointHook {
    /// Checkpoints go to `dir`, named by [`CheckpointConfig::filename`].
    #[must_use]
    pub fn new(config: CheckpointConfig, dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            dir: dir.into(),
            best: None,
        }
    }

    /// Checkpoint options.
    #[must_use]
    pub const fn config(&self) -> &CheckpointConfig {
        &self.config
    }

    /// Checkpoint directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Best monitored value seen so far.
    #[must_use]
    pub const fn best(&self) -> Option<f64> {
        self.best
    }
}

impl OnEpochEnd for ModelCheckpointHook {
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> Result<HookAction> {
        let Some(&value) = metrics.get(&self.config.monitor) else {
            warn!(
                monitor = %self.config.monitor,
                epoch,
                "monitored metric missing, checkpoint skipped"
            );
            return Ok(HookAction::Continue);
        };

        if self.config.save_best_only {
            if !self.config.direction().improves(value, self.best) {
                return Ok(HookAction::Continue);
            }
            info!(
                monitor = %self.config.monitor,
                previous = ?self.best,
                current = value,
                epoch,
                "monitored metric improved"
            );
            self.best = Some(value);
        }

        Ok(HookAction::SaveCheckpoint(
            self.dir.join(self.config.filename(epoch, value)),
        ))
    }
}

/// Times the run and writes the best-performance summary at the end.
#[derive(Debug, Clone)]
pub struct BestPerformanceHook {
    metrics_log: PathBuf,
    output: PathBuf,
    watched_metric: String,
    started: Option<Instant>,
}

impl BestPerformanceHook {
    /// Read `metrics_log` at train end and write the best rows to `output`.
    #[must_use]
    pub fn new(
        metrics_log: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        watched_metric: impl Into<String>,
    ) -> Self {
        Self {
            metrics_log: metrics_log.into(),
            output: output.into(),
            watched_metric: watched_metric.into(),
            started: None,
        }
    }

    /// Metric minimized when selecting the best rows.
    #[must_use]
    pub fn watched_metric(&self) -> &str {
        &self.watched_metric
    }

    /// Summary output path.
    #[must_use]
    pub fn output(&self) -> &Path {
        &self.output
    }
}

impl OnTrainBegin for BestPerformanceHook {
    fn on_train_begin(&mut self) -> Result<()> {
        self.started = Some(Instant::now());
        Ok(())
    }
}

impl OnTrainEnd for BestPerformanceHook {
    fn on_train_end(&mut self, _metrics: &EpochMetrics) -> Result<()> {
        let elapsed = self
            .started
            .map_or(0.0, |started| started.elapsed().as_secs_f64());
        let best = write_best(&self.metrics_log, &self.output, &self.watched_metric, elapsed)?;
        info!(
            rows = best.len(),
            elapsed_secs = elapsed,
            output = %self.output.display(),
            "best performance written"
        );
        Ok(())
    }
}

/// The hooks of one prepared run, invoked in a fixed order.
#[derive(Debug)]
pub struct RunHooks {
    csv_logger: CsvLoggerHook,
    model_checkpoint: ModelCheckpointHook,
    best_performance: BestPerformanceHook,
}

impl RunHooks {
    /// Wire the hooks to the artifact paths of `layout`.
    #[must_use]
    pub fn new(layout: &RunLayout, checkpoint: CheckpointConfig, watched_metric: &str) -> Self {
        Self {
            csv_logger: CsvLoggerHook::new(layout.metrics_log_path()),
            model_checkpoint: ModelCheckpointHook::new(checkpoint, layout.checkpoint_dir()),
            best_performance: BestPerformanceHook::new(
                layout.metrics_log_path(),
                layout.best_performance_path(),
                watched_metric,
            ),
        }
    }

    /// The CSV logger.
    #[must_use]
    pub const fn csv_logger(&self) -> &CsvLoggerHook {
        &self.csv_logger
    }

    /// The checkpoint decider.
    #[must_use]
    pub const fn model_checkpoint(&self) -> &ModelCheckpointHook {
        &self.model_checkpoint
    }

    /// The best-performance writer.
    #[must_use]
    pub const fn best_performance(&self) -> &BestPerformanceHook {
        &self.best_performance
    }
}

impl OnTrainBegin for RunHooks {
    fn on_train_begin(&mut self) -> Result<()> {
        self.csv_logger.on_train_begin()?;
        self.best_performance.on_train_begin()
    }
}

impl OnEpochEnd for RunHooks {
    fn on_epoch_end(&mut self, epoch: usize, metrics: &EpochMetrics) -> Result<HookAction> {
        self.csv_logger.on_epoch_end(epoch, metrics)?;
        self.model_checkpoint.on_epoch_end(epoch, metrics)
    }
}

impl OnTrainEnd for RunHooks {
    fn on_train_end(&mut self, metrics: &EpochMetrics) -> Result<()> {
        self.best_performance.on_train_end(metrics)
    }
}
