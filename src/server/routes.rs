//! HTTP routes for the inference service.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};

use crate::application::{HealthStatus, InferenceService};
use crate::domain::{DebugReport, PredictionRecord};
use crate::ports::Regressor;
use crate::TrialsafeError;

/// Liveness text served at `/`.
pub const LIVENESS_MESSAGE: &str = "server is up - nice job! \n \n";

impl TrialsafeError {
    /// Client errors are 400, everything else is a server failure.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingFeatures(_) | Self::InvalidJson(_) => StatusCode::BAD_REQUEST,
            Self::ModelNotLoaded | Self::Coercion(_) | Self::Inference(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for TrialsafeError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %message, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %message, "Rejected request");
        }
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Build the service router around a shared inference service.
pub fn build_router<R>(service: Arc<InferenceService<R>>) -> Router
where
    R: Regressor + 'static,
{
    Router::new()
        .route("/", get(liveness_handler))
        .route("/health", get(health_handler::<R>))
        .route("/predict", post(predict_handler::<R>))
        .route("/debug", post(debug_handler::<R>))
        .with_state(service)
}

async fn liveness_handler() -> &'static str {
    LIVENESS_MESSAGE
}

async fn health_handler<R: Regressor>(
    State(service): State<Arc<InferenceService<R>>>,
) -> (StatusCode, Json<HealthStatus>) {
    let health = service.health();
    let status = match health {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(health))
}

/// Parse the body ourselves so malformed JSON gets the same `{"error"}` shape
/// as every other failure, whatever the Content-Type.
fn parse_body(body: &Bytes) -> Result<Value, TrialsafeError> {
    serde_json::from_slice(body).map_err(|e| TrialsafeError::InvalidJson(e.to_string()))
}

async fn predict_handler<R: Regressor>(
    State(service): State<Arc<InferenceService<R>>>,
    body: Bytes,
) -> Result<Json<PredictionRecord>, TrialsafeError> {
    let raw = parse_body(&body)?;
    tracing::debug!(payload = %raw, "Received prediction request");
    service.predict(&raw).map(Json)
}

async fn debug_handler<R: Regressor>(
    State(service): State<Arc<InferenceService<R>>>,
    body: Bytes,
) -> Result<Json<DebugReport>, TrialsafeError> {
    let raw = parse_body(&body)?;
    service.debug(&raw).map(Json)
}
