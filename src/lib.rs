//! # Runfolio: Experiment and Run Folders for Training Loops
//!
//! Runfolio decides where a training run lives on disk and keeps that
//! decision stable:
//!
//! - **Experiment id**: a fingerprint of the monitored hyperparameters, so
//!   runs that agree on them land in the same experiment folder
//! - **Run id**: the start minute, or the folder name of a resumed run
//! - **Run folder**: parameters file, metrics log, checkpoints, error log and
//!   best-performance summary at fixed paths
//! - **Hooks**: CSV logging, best-only checkpoint decisions and a
//!   best-performance summary, driven by any training engine
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use runfolio::experiment::ExperimentManager;
//! use serde_json::json;
//!
//! let mut manager = ExperimentManager::new();
//! manager.set_configuration_value(json!({
//!     "model": {"units": 64},
//!     "training": {"lr": 0.01},
//!     "debug": false,
//! }))?;
//! let run = manager.prepare()?;
//! println!("checkpoints go to {}", run.checkpoint_dir().display());
//! # Ok::<(), runfolio::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod error;
pub mod experiment;
pub mod hooks;

pub use error::{Error, Result};
