//! Best-Performance Extractor - reduce a finished metrics log to its best rows
//!
//! The log is read with Arrow's CSV reader (schema inferred from the file),
//! the watched column is reduced to its minimum, and every row holding that
//! minimum is kept. Ties are not broken.

use std::fs::{self, File};
use std::io::Seek;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Array};
use arrow::compute::kernels::cmp::eq;
use arrow::compute::{cast, concat_batches, filter_record_batch, min};
use arrow::csv::reader::Format;
use arrow::csv::ReaderBuilder;
use arrow::datatypes::{DataType, Float64Type, Int64Type};
use arrow::record_batch::RecordBatch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::{Error, Result};

/// Key appended to every selected row.
pub const ELAPSED_KEY: &str = "elapsed";

/// The best row(s) of a metrics log, each carrying the run's elapsed time.
///
/// Serializes as a JSON array of records, columns in log order followed by
/// `elapsed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BestRecord {
    rows: Vec<Map<String, Value>>,
}

impl BestRecord {
    /// The selected rows.
    #[must_use]
    pub fn rows(&self) -> &[Map<String, Value>] {
        &self.rows
    }

    /// Number of selected rows (more than one on ties).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when nothing was selected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write the record list as compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StorageError`] if the file cannot be written.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec(self)?;
        fs::write(path, json).map_err(|e| Error::storage(path, e))
    }
}

/// Select the rows of `metrics_log` whose `watched_metric` equals the column
/// minimum and append `elapsed_secs` to each.
///
/// # Errors
///
/// - [`Error::EmptyLog`] if the log has no data rows
/// - [`Error::MissingColumn`] if `watched_metric` is not a column
/// - [`Error::InvalidInput`] if the column is not numeric or has no values
/// - [`Error::StorageError`] / [`Error::Arrow`] if the log cannot be read
///
/// # Example
///
/// ```rust
/// use runfolio::experiment::extract_best;
///
/// let dir = tempfile::tempdir().unwrap();
/// let log = dir.path().join("training-logs.csv");
/// std::fs::write(&log, "epoch,loss\n0,0.5\n1,0.2\n2,0.3\n").unwrap();
///
/// let best = extract_best(&log, "loss", 12.5).unwrap();
/// assert_eq!(best.len(), 1);
/// assert_eq!(best.rows()[0]["epoch"], 1);
/// assert_eq!(best.rows()[0]["elapsed"], 12.5);
/// ```
pub fn extract_best(
    metrics_log: impl AsRef<Path>,
    watched_metric: &str,
    elapsed_secs: f64,
) -> Result<BestRecord> {
    let path = metrics_log.as_ref();
    let size = fs::metadata(path).map_err(|e| Error::storage(path, e))?.len();
    if size == 0 {
        return Err(Error::EmptyLog {
            path: path.to_path_buf(),
        });
    }

    let batch = read_log(path)?;
    if batch.num_rows() == 0 {
        return Err(Error::EmptyLog {
            path: path.to_path_buf(),
        });
    }

    let index = batch
        .schema()
        .index_of(watched_metric)
        .map_err(|_| Error::MissingColumn {
            column: watched_metric.to_string(),
        })?;

    let column = batch.column(index);
    if !column.data_type().is_numeric() {
        return Err(Error::InvalidInput(format!(
            "column '{watched_metric}' is {}, expected a numeric column",
            column.data_type()
        )));
    }

    let values = cast(column, &DataType::Float64)?;
    let values = values.as_primitive::<Float64Type>();
    let lowest = min(values).ok_or_else(|| {
        Error::InvalidInput(format!("column '{watched_metric}' has no values"))
    })?;

    let mask = eq(values, &Float64Array::new_scalar(lowest))?;
    let selected = filter_record_batch(&batch, &mask)?;

    let elapsed = Number::from_f64(elapsed_secs).map_or(Value::Null, Value::Number);
    let schema = selected.schema();
    let mut rows = Vec::with_capacity(selected.num_rows());
    for row in 0..selected.num_rows() {
        let mut record = Map::new();
        for (field, array) in schema.fields().iter().zip(selected.columns()) {
            record.insert(field.name().clone(), cell(array, row)?);
        }
        record.insert(ELAPSED_KEY.to_string(), elapsed.clone());
        rows.push(record);
    }

    Ok(BestRecord { rows })
}

/// [`extract_best`] and write the result to `output`.
///
/// # Errors
///
/// See [`extract_best`] and [`BestRecord::write`].
pub fn write_best(
    metrics_log: impl AsRef<Path>,
    output: impl AsRef<Path>,
    watched_metric: &str,
    elapsed_secs: f64,
) -> Result<BestRecord> {
    let best = extract_best(metrics_log, watched_metric, elapsed_secs)?;
    best.write(output)?;
    Ok(best)
}

fn read_log(path: &Path) -> Result<RecordBatch> {
    let mut file = File::open(path).map_err(|e| Error::storage(path, e))?;
    let format = Format::default().with_header(true);
    let (schema, _) = format.infer_schema(&mut file, None)?;
    file.rewind().map_err(|e| Error::storage(path, e))?;

    let schema = Arc::new(schema);
    let reader = ReaderBuilder::new(Arc::clone(&schema))
        .with_format(format)
        .build(file)?;

    let batches = reader.collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(concat_batches(&schema, &batches)?)
}

fn cell(array: &ArrayRef, row: usize) -> Result<Value> {
    if array.is_null(row) {
        return Ok(Value::Null);
    }
    let value = match array.data_type() {
        DataType::Boolean => Value::Bool(array.as_boolean().value(row)),
        DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(row)),
        DataType::Float64 => Number::from_f64(array.as_primitive::<Float64Type>().value(row))
            .map_or(Value::Null, Value::Number),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(row).to_string()),
        _ => {
            let text = cast(array, &DataType::Utf8)?;
            Value::String(text.as_string::<i32>().value(row).to_string())
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training-logs.csv");
        fs::write(&path, contents).unwrap();
        (dir, path)
    }

    #[test]
    fn test_ties_are_all_kept() {
        let (_dir, path) = log("epoch,loss\n0,0.5\n1,0.2\n2,0.2\n3,0.8\n");
        let best = extract_best(&path, "loss", 42.0).unwrap();

        assert_eq!(best.len(), 2);
        for (row, epoch) in best.rows().iter().zip([1, 2]) {
            assert_eq!(row["epoch"], epoch);
            assert_eq!(row["loss"], 0.2);
            assert_eq!(row["elapsed"], 42.0);
        }
    }

    #[test]
    fn test_column_order_and_compact_output() {
        let (dir, path) = log("epoch,val_loss,acc\n0,0.9,0.5\n1,0.3,0.75\n");
        let out = dir.path().join("performances.json");

        write_best(&path, &out, "val_loss", 1.5).unwrap();
        let text = fs::read_to_string(&out).unwrap();
        assert_eq!(
            text,
            r#"[{"epoch":1,"val_loss":0.3,"acc":0.75,"elapsed":1.5}]"#
        );
    }

    #[test]
    fn test_empty_log() {
        let (_dir, path) = log("epoch,loss\n");
        assert!(matches!(
            extract_best(&path, "loss", 0.0),
            Err(Error::EmptyLog { .. })
        ));
    }

    #[test]
    fn test_missing_column() {
        let (_dir, path) = log("epoch,loss\n0,0.5\n");
        assert!(matches!(
            extract_best(&path, "val_loss", 0.0),
            Err(Error::MissingColumn { column }) if column == "val_loss"
        ));
    }

    #[test]
    fn test_non_numeric_column() {
        let (_dir, path) = log("epoch,phase\n0,warmup\n1,main\n");
        assert!(matches!(
            extract_best(&path, "phase", 0.0),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_integer_column_and_missing_cells() {
        let (_dir, path) = log("epoch,errors,lr\n0,3,0.1\n1,1,\n2,2,0.01\n");
        let best = extract_best(&path, "errors", 2.0).unwrap();
        assert_eq!(best.len(), 1);
        assert_eq!(best.rows()[0]["epoch"], 1);
        assert_eq!(best.rows()[0]["lr"], Value::Null);
    }
}
