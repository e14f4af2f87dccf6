//! # Trialsafe
//!
//! Adverse event rate prediction for clinical trial designs.
//!
//! This crate provides:
//! - An HTTP inference service over a pre-trained three-target XGBoost model
//! - A terminal form client that submits trial designs and shows the rates
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core business types (trial record, coerced frame, prediction)
//! - `ports`: Trait definitions for external operations
//! - `adapters`: Concrete implementations (XGBoost JSON models, reqwest)
//! - `application`: Use cases orchestrating domain and ports
//! - `server`: axum routes for the inference service
//! - `tui`: Terminal user interface

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod server;
pub mod tui;

pub use domain::{PredictionRecord, TrialFeatureRecord};

/// Result type for Trialsafe operations
pub type Result<T> = std::result::Result<T, TrialsafeError>;

/// Main error type for Trialsafe
#[derive(Debug, thiserror::Error)]
pub enum TrialsafeError {
    #[error("Model not loaded")]
    ModelNotLoaded,

    #[error("{0}")]
    MissingFeatures(domain::MissingFeatures),

    #[error("Invalid JSON body: {0}")]
    InvalidJson(String),

    #[error("{0}")]
    Coercion(String),

    #[error(transparent)]
    Inference(#[from] ports::ModelError),
}

impl From<domain::RecordError> for TrialsafeError {
    fn from(e: domain::RecordError) -> Self {
        match e {
            domain::RecordError::Missing(missing) => Self::MissingFeatures(missing),
            invalid @ domain::RecordError::Invalid { .. } => Self::Coercion(invalid.to_string()),
        }
    }
}
