//! Error types for the tabular-cv harness

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations
pub type Result<T> = std::result::Result<T, CvError>;

/// Main error type
#[derive(Error, Debug)]
pub enum CvError {
    #[error("Split file not found: {0}")]
    MissingSplitFile(PathBuf),

    #[error("ID {id} has varying labels: {labels:?}")]
    InconsistentIdLabel { id: String, labels: Vec<i64> },

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Preprocessor not fitted")]
    UnfittedPreprocessor,

    #[error("Preprocessor already fitted; it is fitted exactly once per run")]
    PreprocessorAlreadyFitted,

    #[error("Preprocessing may only be fitted on a training partition, got {0}")]
    PreprocessorFitRejected(String),

    #[error("No parameter grid defined for model family {0}")]
    NoParamGridDefined(String),

    #[error("Parameter cache for {model} unusable: {reason}")]
    CorruptedOrMissingCache { model: String, reason: String },

    #[error("Fitting {model} failed on fold {fold}: {reason}")]
    FoldFitFailure {
        model: String,
        fold: usize,
        reason: String,
    },

    #[error("Predicting with {model} failed on fold {fold}: {reason}")]
    FoldPredictFailure {
        model: String,
        fold: usize,
        reason: String,
    },

    #[error("Model fit error: {0}")]
    ModelFit(String),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    #[error("Configuration error: {0}")]
    InvalidConfig(String),

    #[error("Invalid parameter: {name} = {value}, {reason}")]
    InvalidParameter {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Metric undefined: {0}")]
    MetricUndefined(String),

    #[error("Search exhausted: no candidate of {0} produced a score")]
    SearchExhausted(String),

    #[error("Invalid shape: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    #[error("Data error: {0}")]
    DataError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<polars::error::PolarsError> for CvError {
    fn from(err: polars::error::PolarsError) -> Self {
        CvError::DataError(err.to_string())
    }
}

impl From<serde_json::Error> for CvError {
    fn from(err: serde_json::Error) -> Self {
        CvError::SerializationError(err.to_string())
    }
}

impl From<ndarray::ShapeError> for CvError {
    fn from(err: ndarray::ShapeError) -> Self {
        CvError::ShapeError {
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
        let err = CvError::ColumnNotFound("Label".to_string());
        assert_eq!(err.to_string(), "Column not found: Label");

        let err = CvError::FoldFitFailure {
            model: "Random Forest".to_string(),
            fold: 3,
            reason: "singular matrix".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Random Forest"));
        assert!(msg.contains("fold 3"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: CvError = io_err.into();
        assert!(matches!(err, CvError::IoError(_)));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: CvError = json_err.into();
        assert!(matches!(err, CvError::SerializationError(_)));
    }
}
