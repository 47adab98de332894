use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mission billing crates.
///
/// The aggregation engine itself is infallible; these variants come from the
/// snapshot store, configuration parsing, and the binary.
#[derive(Error, Debug)]
pub enum BillingError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// One line of a JSONL entry file is not a valid time entry.
    #[error("Malformed entry in {path} at line {line}: {source}")]
    JsonLine {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    /// A date or month string did not match any accepted format.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A range whose end falls before its start.
    #[error("Invalid range: {start} is after {end}")]
    InvalidRange { start: String, end: String },

    /// A stored parameter holds a value of the wrong shape.
    #[error("Invalid value {value:?} for parameter {key}")]
    InvalidParameter { key: String, value: String },

    /// The expected data directory does not exist.
    #[error("Data path not found: {0}")]
    DataPathNotFound(PathBuf),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the billing crates.
pub type Result<T> = std::result::Result<T, BillingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = BillingError::FileRead {
            path: PathBuf::from("/data/missions.json"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("/data/missions.json"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_json_line() {
        let json_err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
        let err = BillingError::JsonLine {
            path: PathBuf::from("entries/2025-03.jsonl"),
            line: 7,
            source: json_err,
        };
        let msg = err.to_string();
        assert!(msg.starts_with("Malformed entry in entries/2025-03.jsonl at line 7"));
    }

    #[test]
    fn test_error_display_invalid_date() {
        let err = BillingError::InvalidDate("2025-13-01".to_string());
        assert_eq!(err.to_string(), "Invalid date: 2025-13-01");
    }

    #[test]
    fn test_error_display_invalid_range() {
        let err = BillingError::InvalidRange {
            start: "2025-03-10".to_string(),
            end: "2025-03-01".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid range: 2025-03-10 is after 2025-03-01"
        );
    }

    #[test]
    fn test_error_display_invalid_parameter() {
        let err = BillingError::InvalidParameter {
            key: "dailyRate".to_string(),
            value: "lots".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid value \"lots\" for parameter dailyRate"
        );
    }

    #[test]
    fn test_error_display_data_path_not_found() {
        let err = BillingError::DataPathNotFound(PathBuf::from("/missing/dir"));
        assert_eq!(err.to_string(), "Data path not found: /missing/dir");
    }

    #[test]
    fn test_error_display_config() {
        let err = BillingError::Config("unknown view".to_string());
        assert_eq!(err.to_string(), "Configuration error: unknown view");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: BillingError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_error_from_serde_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{invalid}").unwrap_err();
        let err: BillingError = json_err.into();
        assert!(err.to_string().contains("Failed to parse JSON"));
    }
}
