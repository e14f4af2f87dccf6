//! Regressor port: Trait for the pre-trained multi-output model.
//!
//! This trait abstracts the gradient-boosting library from the application logic.

use crate::domain::FeatureFrame;

/// Error raised while loading or evaluating a model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Failed to read model artifact {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid model artifact {path}: {reason}")]
    Format { path: String, reason: String },

    #[error("Model file hash mismatch for {0}")]
    DigestMismatch(String),

    #[error("Unsupported model: {0}")]
    Unsupported(String),

    #[error("Inference failed: {0}")]
    Inference(String),
}

/// Trait for multi-output regression models.
///
/// Implementations are loaded once and shared read-only between requests.
pub trait Regressor: Send + Sync {
    /// Names of the outputs, in the order `predict` returns them.
    fn output_names(&self) -> &[&'static str];

    /// Run inference on a single coerced row.
    ///
    /// # Errors
    /// Returns `ModelError::Inference` if the frame cannot be evaluated.
    fn predict(&self, frame: &FeatureFrame) -> Result<Vec<f32>, ModelError>;
}
