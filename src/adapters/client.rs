//! HTTP client adapter: Implementation of PredictionApi using reqwest.
//!
//! Calls are blocking and are expected to run on a worker thread, never on
//! the UI thread or inside an async runtime.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::{PredictionRecord, TrialFeatureRecord};
use crate::ports::{ApiError, ApiHealth, PredictionApi};

/// Bounded wait for a prediction.
pub const PREDICT_TIMEOUT: Duration = Duration::from_secs(30);

/// Bounded wait for the status indicator.
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct HealthBody {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Blocking client for the inference service.
#[derive(Debug, Clone)]
pub struct HttpPredictionClient {
    base_url: String,
    client: Client,
}

impl HttpPredictionClient {
    /// Create a client for the service at `base_url` (e.g. `http://127.0.0.1:8080`).
    ///
    /// # Errors
    /// Returns `ApiError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }
}

impl PredictionApi for HttpPredictionClient {
    fn predict(&self, record: &TrialFeatureRecord) -> Result<PredictionRecord, ApiError> {
        let url = self.url("predict");
        tracing::debug!(%url, "Submitting prediction request");

        let response = self
            .client
            .post(&url)
            .json(record)
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(server_error(response));
        }

        response
            .json::<PredictionRecord>()
            .map_err(|e| ApiError::Decode(e.to_string()))
    }

    fn health(&self) -> Result<ApiHealth, ApiError> {
        let response = self
            .client
            .get(self.url("health"))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        match serde_json::from_str::<HealthBody>(&text) {
            Ok(body) if body.status == "healthy" => Ok(ApiHealth::Healthy),
            Ok(body) => Ok(ApiHealth::Unhealthy(
                body.error.unwrap_or_else(|| body.status.clone()),
            )),
            Err(_) if !status.is_success() => Err(ApiError::Server {
                status: status.as_u16(),
                message: text,
            }),
            Err(e) => Err(ApiError::Decode(e.to_string())),
        }
    }
}

/// Map a non-success response, preferring the body's `error` field.
fn server_error(response: Response) -> ApiError {
    let status = response.status().as_u16();
    let body = response.text().unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);
    ApiError::Server { status, message }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::xgboost::testing::write_fixture_model;
    use crate::adapters::XgbMultiOutputModel;
    use crate::application::InferenceService;
    use crate::domain::sample_payload;
    use crate::server::build_router;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Serve the router on an ephemeral port from a background runtime.
    fn spawn_server(service: InferenceService<XgbMultiOutputModel>) -> SocketAddr {
        let (tx, rx) = std::sync::mpsc::channel();
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("Failed to build runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("Failed to bind");
                tx.send(listener.local_addr().expect("No local addr"))
                    .expect("Failed to report addr");
                axum::serve(listener, build_router(Arc::new(service)))
                    .await
                    .expect("Server failed");
            });
        });
        rx.recv().expect("Server did not start")
    }

    fn client_for(addr: SocketAddr) -> HttpPredictionClient {
        HttpPredictionClient::new(&format!("http://{addr}/"), PREDICT_TIMEOUT)
            .expect("Failed to build client")
    }

    #[test]
    fn test_predict_and_health_against_live_server() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write_fixture_model(dir.path()).expect("Failed to write fixture");
        let addr = spawn_server(InferenceService::load(dir.path()));
        let client = client_for(addr);

        assert_eq!(client.health().expect("Health call"), ApiHealth::Healthy);

        let record = TrialFeatureRecord::from_json(&sample_payload()).expect("Should parse");
        let prediction = client.predict(&record).expect("Predict call");
        assert!((prediction.rate_deaths_calc - 0.022).abs() < 1e-9);
        assert!((prediction.rate_serious_aes_calc - 0.25).abs() < 1e-9);
        assert!((prediction.rate_other_aes_calc - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_unavailable_model_surfaces_server_error() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let addr = spawn_server(InferenceService::load(&dir.path().join("missing")));
        let client = client_for(addr);

        assert_eq!(
            client.health().expect("Health call"),
            ApiHealth::Unhealthy("Model not loaded".to_string())
        );

        let record = TrialFeatureRecord::from_json(&sample_payload()).expect("Should parse");
        match client.predict(&record) {
            Err(ApiError::Server { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "Model not loaded");
            }
            other => panic!("Expected server error, got {other:?}"),
        }
    }

    #[test]
    fn test_unreachable_server_is_transport_error() {
        // Bind then drop to get a port nothing listens on.
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .and_then(|l| l.local_addr())
            .expect("Failed to reserve port")
            .port();
        let client = HttpPredictionClient::new(
            &format!("http://127.0.0.1:{port}"),
            Duration::from_secs(2),
        )
        .expect("Failed to build client");

        let record = TrialFeatureRecord::from_json(&sample_payload()).expect("Should parse");
        assert!(matches!(client.predict(&record), Err(ApiError::Transport(_))));
        assert!(matches!(client.health(), Err(ApiError::Transport(_))));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let client = HttpPredictionClient::new("http://localhost:8080///", PREDICT_TIMEOUT)
            .expect("Failed to build client");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.url("predict"), "http://localhost:8080/predict");
    }
}
