//! Error types for the autisense pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, AutisenseError>;

/// Main error type for the pipeline
#[derive(Error, Debug)]
pub enum AutisenseError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Preprocessing error: {0}")]
    PreprocessingError(String),

    #[error("Training error: {0}")]
    TrainingError(String),

    #[error("Inference error: {0}")]
    InferenceError(String),

    #[error("Optimization error: {0}")]
    OptimizationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Feature not found: {0}")]
    FeatureNotFound(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Convergence failed after {iterations} iterations")]
    ConvergenceError { iterations: usize },

    #[error("Thread pool error: {0}")]
    ThreadPoolError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A categorical value that was never seen while fitting the transform.
    #[error("Unknown category for field '{field}': '{value}'")]
    UnknownCategory { field: String, value: String },

    /// The record's fields differ from the fields the transform was fitted on.
    #[error("Schema mismatch: missing fields {missing:?}, unexpected fields {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Raised only under `ModeTiePolicy::Reject`.
    #[error("Ambiguous mode for field '{field}': candidates {candidates:?}")]
    ImputationAmbiguity {
        field: String,
        candidates: Vec<String>,
    },

    #[error("Invalid label value: '{value}' (expected Yes/No or 1/0)")]
    InvalidLabel { value: String },
}

impl AutisenseError {
    /// True for errors caused by the caller's record rather than by the pipeline.
    pub fn is_contract_violation(&self) -> bool {
        matches!(
            self,
            AutisenseError::UnknownCategory { .. }
                | AutisenseError::SchemaMismatch { .. }
                | AutisenseError::InvalidInput(_)
                | AutisenseError::InvalidLabel { .. }
        )
    }
}

impl From<polars::error::PolarsError> for AutisenseError {
    fn from(err: polars::error::PolarsError) -> Self {
        AutisenseError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for AutisenseError {
    fn from(err: serde_json::Error) -> Self {
        AutisenseError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for AutisenseError {
    fn from(err: ndarray::ShapeError) -> Self {
        AutisenseError::ShapeError {
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
        let err = AutisenseError::UnknownCategory {
            field: "Sex".to_string(),
            value: "x".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown category for field 'Sex': 'x'");
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: AutisenseError = io_err.into();
        assert!(matches!(err, AutisenseError::IoError(_)));
    }

    #[test]
    fn test_contract_violation_classification() {
        let mismatch = AutisenseError::SchemaMismatch {
            missing: vec!["A1".to_string()],
            unexpected: vec![],
        };
        assert!(mismatch.is_contract_violation());
        assert!(!AutisenseError::ModelNotFitted.is_contract_violation());
    }
}
