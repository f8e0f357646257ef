//! Tests for error types

use std::path::PathBuf;

use runfolio::Error;

#[test]
fn test_missing_key_error() {
    let error = Error::MissingKey("training".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("missing key"));
    assert!(error_str.contains("'training'"));
}

#[test]
fn test_run_not_found_error() {
    let error = Error::RunNotFound {
        path: PathBuf::from("experiments/exp-1/run-2"),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Run not found"));
    assert!(error_str.contains("experiments/exp-1/run-2"));
}

#[test]
fn test_no_checkpoint_found_error() {
    let error = Error::NoCheckpointFound {
        path: PathBuf::from("experiments/exp-1/run-2/models"),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("No checkpoint found"));
    assert!(error_str.ends_with("models"));
}

#[test]
fn test_lifecycle_errors() {
    assert!(format!("{}", Error::NotConfigured).contains("set_configuration"));
    assert!(format!("{}", Error::NotPrepared).contains("prepare or resume"));
    assert!(format!("{}", Error::AlreadyPrepared).contains("immutable"));
}

#[test]
fn test_storage_error_keeps_source() {
    use std::error::Error as _;

    let error = Error::StorageError {
        path: PathBuf::from("/readonly/exp"),
        source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("Storage error at /readonly/exp"));
    assert!(error.source().is_some());
}

#[test]
fn test_extractor_errors() {
    let empty = Error::EmptyLog {
        path: PathBuf::from("training-logs.csv"),
    };
    assert!(format!("{empty}").contains("has no rows"));

    let missing = Error::MissingColumn {
        column: "val_loss".to_string(),
    };
    assert_eq!(format!("{missing}"), "Metrics log has no column 'val_loss'");
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
}

#[test]
fn test_json_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: Error = json_error.into();
    assert!(format!("{error}").starts_with("JSON error"));
}

#[test]
fn test_csv_error_conversion() {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader("a,b\nc\n".as_bytes());
    let csv_error = reader.records().find_map(Result::err).unwrap();
    let error: Error = csv_error.into();
    assert!(format!("{error}").starts_with("CSV error"));
}

#[test]
fn test_error_debug() {
    let error = Error::NotConfigured;
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("NotConfigured"));
}

#[test]
fn test_result_type_alias() {
    #[allow(clippy::unnecessary_wraps)]
    fn returns_result() -> runfolio::Result<i32> {
        Ok(42)
    }

    let result = returns_result();
    assert!(result.is_ok());
    assert_eq!(result.unwrap(), 42);
}

#[test]
fn test_result_type_alias_error() {
    fn returns_error() -> runfolio::Result<i32> {
        Err(Error::InvalidInput("test error".to_string()))
    }

    let result = returns_error();
    assert!(result.is_err());
}
