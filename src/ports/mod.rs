//! Ports layer: Trait definitions for external operations.
//!
//! Following Hexagonal Architecture, these traits define the boundaries
//! between the application and external systems (model library, HTTP).

mod prediction_api;
mod regressor;

pub use prediction_api::{ApiError, ApiHealth, PredictionApi};
pub use regressor::{ModelError, Regressor};
