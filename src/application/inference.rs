//! Inference service: Maps raw trial records to predicted rates.
//!
//! This service coordinates:
//! - Model availability (loaded once at startup, never reloaded)
//! - Presence validation of the ten input fields
//! - Coercion to the model's column dtypes
//! - Model invocation and rounding of the outputs

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::XgbMultiOutputModel;
use crate::domain::{
    missing_features, DebugReport, FeatureFrame, MissingFeatures, PredictionRecord,
    TrialFeatureRecord,
};
use crate::ports::{ModelError, Regressor};
use crate::TrialsafeError;

/// Model availability, fixed at process start.
#[derive(Debug)]
pub enum ModelState<R> {
    Loaded(Arc<R>),
    Unavailable(String),
}

/// Body of the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy { error: String },
}

/// Service for running model inference on single trial records.
pub struct InferenceService<R: Regressor> {
    state: ModelState<R>,
}

impl InferenceService<XgbMultiOutputModel> {
    /// Load the model directory, falling back to Unavailable on any failure.
    ///
    /// The process keeps serving liveness and health checks without a model.
    pub fn load(model_dir: &Path) -> Self {
        tracing::info!(model_dir = %model_dir.display(), "Loading model...");

        match XgbMultiOutputModel::load(model_dir) {
            Ok(model) => Self::new(ModelState::Loaded(Arc::new(model))),
            Err(e) => {
                tracing::error!(model_dir = %model_dir.display(), error = %e, "Failed to load model");
                Self::new(ModelState::Unavailable(e.to_string()))
            }
        }
    }
}

impl<R: Regressor> InferenceService<R> {
    pub fn new(state: ModelState<R>) -> Self {
        Self { state }
    }

    /// Service backed by an already loaded model.
    pub fn with_model(model: R) -> Self {
        Self::new(ModelState::Loaded(Arc::new(model)))
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        matches!(self.state, ModelState::Loaded(_))
    }

    /// Why the model is unavailable, if it is.
    #[must_use]
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            ModelState::Loaded(_) => None,
            ModelState::Unavailable(reason) => Some(reason.as_str()),
        }
    }

    fn model(&self) -> Result<&R, TrialsafeError> {
        match &self.state {
            ModelState::Loaded(model) => Ok(model),
            ModelState::Unavailable(_) => Err(TrialsafeError::ModelNotLoaded),
        }
    }

    #[must_use]
    pub fn health(&self) -> HealthStatus {
        if self.is_loaded() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Unhealthy {
                error: TrialsafeError::ModelNotLoaded.to_string(),
            }
        }
    }

    /// Predict the three rates for one raw record.
    ///
    /// # Errors
    /// - `ModelNotLoaded` while the model is unavailable
    /// - `MissingFeatures` listing every absent field
    /// - `Coercion` or `Inference` for any later failure
    pub fn predict(&self, raw: &Value) -> Result<PredictionRecord, TrialsafeError> {
        let model = self.model()?;

        let missing = missing_features(raw);
        if !missing.is_empty() {
            return Err(TrialsafeError::MissingFeatures(MissingFeatures(missing)));
        }

        let record = TrialFeatureRecord::from_json(raw)?;
        let frame = FeatureFrame::from_record(&record);
        let report = frame.debug_report();
        tracing::debug!(dtypes = ?report.dtypes, values = ?report.values, "Processed input");

        let outputs = model.predict(&frame)?;
        if outputs.len() != model.output_names().len() {
            return Err(ModelError::Inference(format!(
                "model returned {} outputs for {} targets",
                outputs.len(),
                model.output_names().len()
            ))
            .into());
        }

        let prediction = PredictionRecord::from_outputs(&outputs).map_err(ModelError::Inference)?;
        tracing::info!(
            rate_deaths_calc = prediction.rate_deaths_calc,
            rate_serious_aes_calc = prediction.rate_serious_aes_calc,
            rate_other_aes_calc = prediction.rate_other_aes_calc,
            "Prediction complete"
        );
        Ok(prediction)
    }

    /// Describe how a raw record is coerced, without running the model.
    ///
    /// Absent fields appear as `null` values.
    ///
    /// # Errors
    /// `ModelNotLoaded` while the model is unavailable, `Coercion` if the
    /// body is not an object or a present value cannot take its column's dtype.
    pub fn debug(&self, raw: &Value) -> Result<DebugReport, TrialsafeError> {
        self.model()?;
        if !raw.is_object() {
            return Err(TrialsafeError::Coercion(format!(
                "Expected a JSON object of features, got {}",
                json_kind(raw)
            )));
        }
        let frame = FeatureFrame::from_json(raw)?;
        Ok(frame.debug_report())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
