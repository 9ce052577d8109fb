//! Error types for the ledger_import library.

use std::io;
use thiserror::Error;

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading, validating, importing or
/// exporting accounting files.
///
/// Problems with individual rows are not errors: they are reported as
/// [`Issue`](crate::types::Issue)s inside parse and validation results.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred during read or write operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error tokenizing or writing CSV.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error reported by the ledger store.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Error serializing a report.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration file could not be read or understood.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid date format.
    #[error("Invalid date format: {0}")]
    InvalidDate(String),

    /// Invalid amount format.
    #[error("Invalid amount format: {0}")]
    InvalidAmount(String),

    /// Invalid format specified.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// Unknown or unsupported text encoding label.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// The file did not pass validation and the import was refused.
    #[error("Validation failed with {errors} error(s); import refused")]
    ValidationFailed { errors: usize },
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
