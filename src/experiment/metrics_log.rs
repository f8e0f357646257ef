//! Metrics log - append-only CSV of per-epoch metrics
//!
//! The header (`epoch` followed by the metric names in sorted order) is
//! written once, when the file is new or empty. Re-opening an existing log,
//! as a resumed run does, keeps appending under the existing header.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{Error, Result};

/// Metric name to value for one epoch.
pub type EpochMetrics = BTreeMap<String, f64>;

/// Name of the leading column.
pub const EPOCH_COLUMN: &str = "epoch";

/// Append-only writer for `training-logs.csv`.
#[derive(Debug)]
pub struct MetricsLog {
    path: PathBuf,
    columns: Option<Vec<String>>,
}

impl MetricsLog {
    /// Open the log at `path`, picking up the columns of an existing header.
    ///
    /// The file itself is created on the first [`append`](Self::append).
    ///
    /// # Errors
    ///
    /// - [`Error::StorageError`] if an existing log cannot be opened
    /// - [`Error::Csv`] if its header cannot be parsed
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let columns = read_header(&path)?;
        Ok(Self { path, columns })
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metric columns fixed by the header, if one was written yet.
    #[must_use]
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Append the row of a finished epoch.
    ///
    /// The first row ever written fixes the metric columns. Later rows leave a
    /// missing metric empty and drop metrics the header does not know.
    ///
    /// # Errors
    ///
    /// - [`Error::StorageError`] if the file cannot be opened
    /// - [`Error::Csv`] if a record cannot be written
    pub fn append(&mut self, epoch: usize, metrics: &EpochMetrics) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| Error::storage(&self.path, e))?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if self.columns.is_none() {
            let columns: Vec<String> = metrics.keys().cloned().collect();
            let header = std::iter::once(EPOCH_COLUMN).chain(columns.iter().map(String::as_str));
            writer.write_record(header)?;
            self.columns = Some(columns);
        }
        let columns = self.columns.as_deref().unwrap_or_default();

        for key in metrics.keys().filter(|key| !columns.contains(key)) {
            warn!(metric = %key, log = %self.path.display(), "metric not in log header, dropped");
        }

        let row = std::iter::once(epoch.to_string()).chain(
            columns
                .iter()
                .map(|c| metrics.get(c).map(ToString::to_string).unwrap_or_default()),
        );
        writer.write_record(row)?;
        writer.flush().map_err(|e| Error::storage(&self.path, e))
    }
}

fn reader(path: &Path) -> Result<csv::Reader<File>> {
    let file = File::open(path).map_err(|e| Error::storage(path, e))?;
    Ok(csv::ReaderBuilder::new().has_headers(true).from_reader(file))
}

fn read_header(path: &Path) -> Result<Option<Vec<String>>> {
    if !path.exists() {
        return Ok(None);
    }
    let mut reader = reader(path)?;
    let header = reader.headers()?;
    if header.is_empty() {
        return Ok(None);
    }
    Ok(Some(header.iter().skip(1).map(ToString::to_string).collect()))
}

/// Number of data rows in a metrics log (header excluded).
///
/// # Errors
///
/// - [`Error::StorageError`] if the log cannot be opened
/// - [`Error::Csv`] if a row cannot be parsed
pub fn row_count(path: impl AsRef<Path>) -> Result<usize> {
    let mut rows = 0;
    for record in reader(path.as_ref())?.records() {
        record?;
        rows += 1;
    }
    Ok(rows)
}
