//! Error types for the salvage recovery engine
//!
//! Only conditions that stop a whole batch live here. Per-record problems
//! (unparseable fields, blocked equations, empty reference groups) are
//! recovered in place and counted in [`crate::recovery::RecoveryReport`].

use thiserror::Error;

/// Result type alias for salvage operations
pub type Result<T> = std::result::Result<T, SalvageError>;

/// Main error type for the recovery and preparation pipeline
#[derive(Error, Debug)]
pub enum SalvageError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("No complete records available to derive reference medians for {field}")]
    NoReferenceData { field: String },

    #[error(
        "Identity violation: {violations} record(s) break total = quantity * unit_price \
         (max residual {max_residual:e}, tolerance {tolerance:e})"
    )]
    IdentityViolation {
        violations: usize,
        max_residual: f64,
        tolerance: f64,
    },

    #[error("Empty partition: {0}")]
    EmptyPartition(String),
}

impl From<polars::error::PolarsError> for SalvageError {
    fn from(err: polars::error::PolarsError) -> Self {
        SalvageError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for SalvageError {
    fn from(err: serde_json::Error) -> Self {
        SalvageError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for SalvageError {
    fn from(err: ndarray::ShapeError) -> Self {
        SalvageError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
