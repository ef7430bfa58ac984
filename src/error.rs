//! Error types for windowed example generation

use thiserror::Error;

/// Result type alias for windowing operations
pub type Result<T> = std::result::Result<T, WindowError>;

/// Main error type for the crate
#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Invalid interval: {0}")]
    InvalidInterval(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid anchor {anchor}: {reason}")]
    InvalidAnchor { anchor: usize, reason: String },

    #[error("Stale split: built for {expected}, current configuration is {actual}")]
    StaleSplit { expected: String, actual: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<polars::error::PolarsError> for WindowError {
    fn from(err: polars::error::PolarsError) -> Self {
        WindowError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for WindowError {
    fn from(err: serde_json::Error) -> Self {
        WindowError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for WindowError {
    fn from(err: ndarray::ShapeError) -> Self {
        WindowError::ShapeMismatch {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
