//! Error types for the minute-dataset pipeline.

use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the minute-dataset pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The security catalog could not be read.
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// A source file does not exist.
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Malformed or unparseable table.
    #[error("Data format error: {0}")]
    DataFormat(String),

    /// No usable daily label for a trading date.
    #[error("Label missing for {0}")]
    LabelMissing(NaiveDate),

    /// Window max equals window min, normalization is undefined.
    #[error("Degenerate normalization window for {0}")]
    DegenerateWindow(NaiveDate),

    /// Corrupt, truncated or unreadable cache.
    #[error("Cache format error: {0}")]
    CacheFormat(String),

    /// Positional access outside `[0, len)`.
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a catalog error.
    pub fn catalog(msg: impl Into<String>) -> Self {
        Error::Catalog(msg.into())
    }

    /// Create a file-not-found error.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Error::FileNotFound { path: path.into() }
    }

    /// Create a data format error.
    pub fn data_format(msg: impl Into<String>) -> Self {
        Error::DataFormat(msg.into())
    }

    /// Create a cache format error.
    pub fn cache_format(msg: impl Into<String>) -> Self {
        Error::CacheFormat(msg.into())
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// Whether this error only disqualifies a single security.
    ///
    /// Catalog, configuration and cache failures abort a build; everything
    /// else degrades to fewer records.
    pub fn is_per_security(&self) -> bool {
        !matches!(
            self,
            Error::Config(_) | Error::Catalog(_) | Error::CacheFormat(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let date = NaiveDate::from_ymd_opt(2021, 3, 1).unwrap();
        assert_eq!(Error::LabelMissing(date).to_string(), "Label missing for 2021-03-01");
        assert_eq!(
            Error::IndexOutOfRange { index: 7, len: 3 }.to_string(),
            "Index 7 out of range for dataset of length 3"
        );
        assert_eq!(
            Error::file_not_found("/data/000001.csv").to_string(),
            "File not found: /data/000001.csv"
        );
    }

    #[test]
    fn test_per_security_classification() {
        assert!(Error::data_format("bad column").is_per_security());
        assert!(Error::file_not_found("x.parquet").is_per_security());
        assert!(!Error::catalog("unreadable").is_per_security());
        assert!(!Error::cache_format("truncated").is_per_security());
    }
}
