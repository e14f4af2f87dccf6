//! Prediction API port: Trait for the client's view of the inference service.

use crate::domain::{PredictionRecord, TrialFeatureRecord};

/// Error surfaced to the client user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("API call failed: {0}")]
    Transport(String),

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Decode(String),
}

/// Service health as reported by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiHealth {
    Healthy,
    Unhealthy(String),
}

/// Trait for submitting trial records to a remote model.
pub trait PredictionApi: Send + Sync {
    /// Submit one record and wait for the three rates.
    ///
    /// # Errors
    /// Returns `ApiError` on transport failure or a non-success response.
    fn predict(&self, record: &TrialFeatureRecord) -> Result<PredictionRecord, ApiError>;

    /// Query service health.
    ///
    /// # Errors
    /// Returns `ApiError::Transport` if the service cannot be reached.
    fn health(&self) -> Result<ApiHealth, ApiError>;
}
