//! Error types for the prediction pipeline

use thiserror::Error;

/// Errors raised while loading models or serving a prediction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    /// Artifact missing or corrupt at startup. Fatal for that model only.
    #[error("Failed to load model '{model}': {reason}")]
    ModelLoadFailure { model: String, reason: String },

    /// Raw input was requested but no scaler is loaded for the model
    #[error("Cannot process raw input for '{model}': scaler not loaded. Provide normalized input instead")]
    ScalerUnavailable { model: String },

    /// Vector width (or feature order) does not match what the model expects
    #[error("Dimension mismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A feature required for scaling was not present in the sample
    #[error("Missing feature: {0}")]
    MissingFeature(String),

    /// Input field has no slot in the model (strict alignment only)
    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    /// Neighbor lookup failed. Callers fall back to zero uncertainty.
    #[error("Neighbor query failed: {0}")]
    NeighborQueryFailure(String),

    /// Model evaluation failed
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Request payload failed validation
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl PredictionError {
    pub fn load_failure(model: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::ModelLoadFailure {
            model: model.into(),
            reason: reason.to_string(),
        }
    }

    /// Short machine-readable kind, used for metric labels and error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ModelLoadFailure { .. } => "model_load_failure",
            Self::ScalerUnavailable { .. } => "scaler_unavailable",
            Self::DimensionMismatch { .. } => "dimension_mismatch",
            Self::MissingFeature(_) => "missing_feature",
            Self::UnknownFeature(_) => "unknown_feature",
            Self::NeighborQueryFailure(_) => "neighbor_query_failure",
            Self::Inference(_) => "inference",
            Self::InvalidInput(_) => "invalid_input",
        }
    }

    /// True for errors caused by the request rather than the server
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::ScalerUnavailable { .. }
                | Self::DimensionMismatch { .. }
                | Self::MissingFeature(_)
                | Self::UnknownFeature(_)
                | Self::InvalidInput(_)
        )
    }
}

/// Result type for prediction operations
pub type Result<T> = std::result::Result<T, PredictionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_failure_message() {
        let error = PredictionError::load_failure("knn_systolic", "file not found");
        assert_eq!(
            error.to_string(),
            "Failed to load model 'knn_systolic': file not found"
        );
        assert_eq!(error.kind(), "model_load_failure");
        assert!(!error.is_client_error());
    }

    #[test]
    fn test_dimension_mismatch_message() {
        let error = PredictionError::DimensionMismatch {
            expected: 16,
            actual: 15,
        };
        assert_eq!(
            error.to_string(),
            "Dimension mismatch: expected 16 features, got 15"
        );
        assert!(error.is_client_error());
    }

    #[test]
    fn test_scaler_unavailable_is_client_error() {
        let error = PredictionError::ScalerUnavailable {
            model: "random_forest".to_string(),
        };
        assert!(error.is_client_error());
        assert!(error.to_string().contains("random_forest"));
    }

    #[test]
    fn test_neighbor_failure_is_not_client_error() {
        let error = PredictionError::NeighborQueryFailure("index out of range".to_string());
        assert!(!error.is_client_error());
        assert_eq!(error.kind(), "neighbor_query_failure");
    }
}
