//! Identity Resolver - experiment and run identifiers

use std::fmt;

use chrono::{DateTime, Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::fingerprint::hash8;
use crate::{Error, Result};

/// Hyperparameters of one training run, keyed by name.
pub type Configuration = serde_json::Map<String, Value>;

/// Identifier of an experiment folder: `exp-{h1}-{h2}-...`.
///
/// Two configurations that agree on every monitored key share the same
/// experiment id, which is how runs of the same experiment end up in one
/// folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExperimentId(String);

impl ExperimentId {
    /// Prefix of every derived experiment id.
    pub const PREFIX: &'static str = "exp";

    /// Derive the experiment id from the monitored subset of `config`.
    ///
    /// One fingerprint segment is emitted per key, in the given order. The
    /// order only affects segment placement; configurations compared with the
    /// same key list are equal exactly when their monitored values are.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingKey`] if a monitored key is absent from `config`
    /// - [`Error::InvalidInput`] if `monitored_keys` is empty
    ///
    /// # Example
    ///
    /// ```rust
    /// use runfolio::experiment::{Configuration, ExperimentId};
    /// use serde_json::json;
    ///
    /// let config: Configuration = serde_json::from_value(json!({
    ///     "model": {"units": 64},
    ///     "training": {"lr": 0.01},
    ///     "debug": false,
    /// })).unwrap();
    ///
    /// let id = ExperimentId::from_config(&config, &["model", "training"]).unwrap();
    /// assert!(id.as_str().starts_with("exp-"));
    /// assert_eq!(id.as_str().split('-').count(), 3);
    /// ```
    pub fn from_config<K: AsRef<str>>(config: &Configuration, monitored_keys: &[K]) -> Result<Self> {
        if monitored_keys.is_empty() {
            return Err(Error::InvalidInput(
                "at least one monitored key is required".to_string(),
            ));
        }

        let mut id = String::from(Self::PREFIX);
        for key in monitored_keys {
            let key = key.as_ref();
            let value = config
                .get(key)
                .ok_or_else(|| Error::MissingKey(key.to_string()))?;
            id.push('-');
            id.push_str(&hash8(value)?);
        }

        debug!(experiment_id = %id, "derived experiment id");
        Ok(Self(id))
    }

    /// Wrap an existing experiment folder name verbatim.
    #[must_use]
    pub fn new(folder: impl Into<String>) -> Self {
        Self(folder.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExperimentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExperimentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a run folder inside an experiment.
///
/// Generated ids have minute resolution (`run--YY-MM-DD--HH-MM`): two runs of
/// the same experiment prepared within the same wall-clock minute resolve to
/// the same folder. The format is kept as-is so existing run folders stay
/// addressable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// `strftime` pattern of the time part.
    pub const TIME_FORMAT: &'static str = "%y-%m-%d--%H-%M";

    /// Return `explicit` verbatim when given, otherwise a fresh time-based id.
    #[must_use]
    pub fn resolve(explicit: Option<&str>) -> Self {
        explicit.map_or_else(Self::generate, Self::new)
    }

    /// Generate an id from the current local time.
    #[must_use]
    pub fn generate() -> Self {
        Self::at(&Local::now())
    }

    /// Generate the id a run started at `instant` would get.
    #[must_use]
    pub fn at<Tz: TimeZone>(instant: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self(format!("run--{}", instant.format(Self::TIME_FORMAT)))
    }

    /// Wrap an existing run folder name verbatim.
    #[must_use]
    pub fn new(folder: impl Into<String>) -> Self {
        Self(folder.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The experiment/run pair that locates a run folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunIdentity {
    experiment_id: ExperimentId,
    run_id: RunId,
}

impl RunIdentity {
    /// Pair an experiment id with a run id.
    #[must_use]
    pub const fn new(experiment_id: ExperimentId, run_id: RunId) -> Self {
        Self {
            experiment_id,
            run_id,
        }
    }

    /// Get the experiment id.
    #[must_use]
    pub const fn experiment_id(&self) -> &ExperimentId {
        &self.experiment_id
    }

    /// Get the run id.
    #[must_use]
    pub const fn run_id(&self) -> &RunId {
        &self.run_id
    }
}
