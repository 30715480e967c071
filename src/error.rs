//! Error types for the flood-risk pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, FloodError>;

/// Main error type for the flood-risk pipeline
#[derive(Error, Debug)]
pub enum FloodError {
    /// Source file missing, unreadable, or not tabular
    #[error("Data load error: {0}")]
    DataLoad(String),

    /// Incoming table does not carry a column the transformer was fit on
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Not enough minority samples to interpolate
    #[error("Imbalance correction error: {0}")]
    Imbalance(String),

    #[error("Training error: {0}")]
    Training(String),

    /// Persisted artifact is missing a required field or is corrupt
    #[error("Bundle format error: {0}")]
    BundleFormat(String),

    /// Weather lookup failure; recovered at the inference boundary
    #[error("External service error: {0}")]
    ExternalService(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

impl From<polars::error::PolarsError> for FloodError {
    fn from(err: polars::error::PolarsError) -> Self {
        FloodError::DataLoad(err.to_string())
    }
}

impl From<calamine::Error> for FloodError {
    fn from(err: calamine::Error) -> Self {
        FloodError::DataLoad(err.to_string())
    }
}

impl From<csv::Error> for FloodError {
    fn from(err: csv::Error) -> Self {
        FloodError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for FloodError {
    fn from(err: serde_json::Error) -> Self {
        FloodError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for FloodError {
    fn from(err: bincode::Error) -> Self {
        FloodError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for FloodError {
    fn from(err: ndarray::ShapeError) -> Self {
        FloodError::Training(format!("invalid matrix shape: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FloodError::SchemaMismatch("missing column 'Rainfall'".to_string());
        assert_eq!(err.to_string(), "Schema mismatch: missing column 'Rainfall'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: FloodError = io_err.into();
        assert!(matches!(err, FloodError::Io(_)));
    }
}
