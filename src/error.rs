//! Error types for the Kolosal forecasting pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, KolosalError>;

/// Main error type for the forecasting pipeline
#[derive(Error, Debug)]
pub enum KolosalError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Unparsable timestamp in column '{column}' at row {row}: '{value}'")]
    TimestampParse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Column '{0}' contains no numeric values")]
    NonNumericColumn(String),

    #[error("Column '{0}' is entirely missing")]
    EmptyColumn(String),

    #[error("Insufficient data in {segment} segment: expected at least {expected} rows, got {actual}")]
    InsufficientData {
        segment: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for KolosalError {
    fn from(err: polars::error::PolarsError) -> Self {
        KolosalError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for KolosalError {
    fn from(err: serde_json::Error) -> Self {
        KolosalError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for KolosalError {
    fn from(err: ndarray::ShapeError) -> Self {
        KolosalError::ShapeError {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = KolosalError::ConfigError("context_length must be > 0".to_string());
        assert_eq!(err.to_string(), "Configuration error: context_length must be > 0");
    }

    #[test]
    fn test_insufficient_data_names_segment() {
        let err = KolosalError::InsufficientData {
            segment: "validation".to_string(),
            expected: 60,
            actual: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("validation"));
        assert!(msg.contains("60"));
        assert!(msg.contains("12"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: KolosalError = io_err.into();
        assert!(matches!(err, KolosalError::IoError(_)));
    }
}
