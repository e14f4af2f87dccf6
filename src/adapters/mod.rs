//! Adapters layer: Concrete implementations of ports.
//!
//! These modules contain the actual integration with external libraries:
//! - `xgboost`: XGBoost JSON tree ensembles for the regressor port
//! - `client`: reqwest HTTP client for the prediction API port

pub mod client;
pub mod xgboost;

pub use client::HttpPredictionClient;
pub use xgboost::XgbMultiOutputModel;
