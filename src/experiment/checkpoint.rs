//! Checkpoint policy - typed checkpoint options and checkpoint lookup

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// How the monitored value is compared between epochs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointMode {
    /// Infer from the monitor name (accuracy-like metrics are maximized).
    #[default]
    Auto,
    /// Lower is better.
    Min,
    /// Higher is better.
    Max,
}

/// Resolved comparison direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Keep the lowest value seen.
    Minimize,
    /// Keep the highest value seen.
    Maximize,
}

impl Direction {
    /// True when `candidate` strictly beats `best` (always true with no best yet).
    ///
    /// NaN never improves.
    #[must_use]
    pub fn improves(self, candidate: f64, best: Option<f64>) -> bool {
        if candidate.is_nan() {
            return false;
        }
        match (self, best) {
            (_, None) => true,
            (Self::Minimize, Some(best)) => candidate < best,
            (Self::Maximize, Some(best)) => candidate > best,
        }
    }
}

impl CheckpointMode {
    /// Resolve `Auto` against the monitored metric name.
    #[must_use]
    pub fn direction(self, monitor: &str) -> Direction {
        match self {
            Self::Min => Direction::Minimize,
            Self::Max => Direction::Maximize,
            Self::Auto if monitor.contains("acc") || monitor.starts_with("fmeasure") => {
                Direction::Maximize
            }
            Self::Auto => Direction::Minimize,
        }
    }
}

/// Options handed to the model-checkpoint hook.
///
/// Unrecognized keys from a serialized config are kept in `extensions` so an
/// engine can read its own options without this crate knowing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Comparison mode.
    #[serde(default)]
    pub mode: CheckpointMode,
    /// Metric watched to decide whether a checkpoint is written.
    #[serde(default = "default_monitor")]
    pub monitor: String,
    /// Only write a checkpoint when the monitored value improves.
    #[serde(default = "default_save_best_only")]
    pub save_best_only: bool,
    /// Engine-specific options.
    #[serde(flatten)]
    pub extensions: serde_json::Map<String, serde_json::Value>,
}

fn default_monitor() -> String {
    "val_loss".to_string()
}

const fn default_save_best_only() -> bool {
    true
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            mode: CheckpointMode::Auto,
            monitor: default_monitor(),
            save_best_only: default_save_best_only(),
            extensions: serde_json::Map::new(),
        }
    }
}

impl CheckpointConfig {
    /// Watch `monitor` instead of `val_loss`.
    #[must_use]
    pub fn monitor(mut self, monitor: impl Into<String>) -> Self {
        self.monitor = monitor.into();
        self
    }

    /// Set the comparison mode.
    #[must_use]
    pub const fn mode(mut self, mode: CheckpointMode) -> Self {
        self.mode = mode;
        self
    }

    /// Write a checkpoint every epoch (`false`) or only on improvement (`true`).
    #[must_use]
    pub const fn save_best_only(mut self, save_best_only: bool) -> Self {
        self.save_best_only = save_best_only;
        self
    }

    /// Attach an engine-specific option.
    #[must_use]
    pub fn extension(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.extensions.insert(key.into(), value);
        self
    }

    /// Comparison direction for the configured monitor.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.mode.direction(&self.monitor)
    }

    /// Checkpoint file name for a zero-based `epoch` and the monitored value:
    /// `model.{epoch+1:02}-{value:.4}.hdf5`.
    #[must_use]
    pub fn filename(&self, epoch: usize, value: f64) -> String {
        format!("model.{:02}-{value:.4}.hdf5", epoch + 1)
    }
}

/// Most recently modified entry of a checkpoint directory.
///
/// Entries are opaque: files and sub-directories both count.
///
/// # Errors
///
/// - [`Error::NoCheckpointFound`] if `dir` is missing or empty
/// - [`Error::StorageError`] if the directory or an entry's metadata cannot be read
pub fn latest_checkpoint(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(Error::NoCheckpointFound {
                path: dir.to_path_buf(),
            });
        }
        Err(e) => return Err(Error::storage(dir, e)),
    };

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in entries {
        let entry = entry.map_err(|e| Error::storage(dir, e))?;
        let path = entry.path();
        let modified = entry
            .metadata()
            .and_then(|m| m.modified())
            .map_err(|e| Error::storage(&path, e))?;

        if latest.as_ref().map_or(true, |(newest, _)| modified >= *newest) {
            latest = Some((modified, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| Error::NoCheckpointFound {
            path: dir.to_path_buf(),
        })
}
