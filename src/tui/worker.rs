//! Background request workers for the form client.
//!
//! Each user action runs one blocking HTTP call on its own thread and reports
//! over an mpsc channel, so the TUI main loop never waits on the network.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

use crate::domain::{PredictionRecord, TrialFeatureRecord};
use crate::ports::{ApiHealth, PredictionApi};

/// A prediction that came back from the service.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionOutcome {
    pub prediction: PredictionRecord,
    /// Wall-clock time the response arrived
    pub received_at: DateTime<Local>,
    /// Round-trip duration
    pub elapsed: Duration,
}

/// Progress updates from the prediction worker.
#[derive(Debug, Clone, PartialEq)]
pub enum PredictionProgress {
    /// Request is on the wire
    Submitting,
    /// Service answered with three rates
    Complete(PredictionOutcome),
    /// Transport failure or non-success response
    Error(String),
}

/// Result of a health probe, as shown in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiStatus {
    Unknown,
    Checking,
    Healthy,
    /// Reachable but the model is not serving
    Unhealthy(String),
    Unreachable(String),
}

impl From<ApiHealth> for ApiStatus {
    fn from(health: ApiHealth) -> Self {
        match health {
            ApiHealth::Healthy => Self::Healthy,
            ApiHealth::Unhealthy(reason) => Self::Unhealthy(reason),
        }
    }
}

/// Handle to a running worker thread.
pub struct WorkerHandle<T> {
    /// Receiver for progress updates
    pub progress_rx: Receiver<T>,
    /// Thread handle (for joining)
    _handle: JoinHandle<()>,
}

impl<T> WorkerHandle<T> {
    /// Try to receive the next progress update (non-blocking).
    #[must_use]
    pub fn try_recv(&self) -> Option<T> {
        self.progress_rx.try_recv().ok()
    }
}

/// Runs prediction and health calls in the background.
pub struct PredictionWorker;

impl PredictionWorker {
    /// Submit one record.
    ///
    /// Returns a handle to receive progress updates.
    pub fn spawn<A>(api: Arc<A>, record: TrialFeatureRecord) -> WorkerHandle<PredictionProgress>
    where
        A: PredictionApi + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            Self::run_prediction(api.as_ref(), &record, &tx);
        });

        WorkerHandle {
            progress_rx: rx,
            _handle: handle,
        }
    }

    /// Probe the service health endpoint.
    pub fn check_health<A>(api: Arc<A>) -> WorkerHandle<ApiStatus>
    where
        A: PredictionApi + ?Sized + 'static,
    {
        let (tx, rx) = mpsc::channel();

        let handle = thread::spawn(move || {
            let status = match api.health() {
                Ok(health) => ApiStatus::from(health),
                Err(e) => {
                    tracing::warn!(error = %e, "Health check failed");
                    ApiStatus::Unreachable(e.to_string())
                }
            };
            let _ = tx.send(status);
        });

        WorkerHandle {
            progress_rx: rx,
            _handle: handle,
        }
    }

    fn run_prediction<A>(api: &A, record: &TrialFeatureRecord, tx: &Sender<PredictionProgress>)
    where
        A: PredictionApi + ?Sized,
    {
        let _ = tx.send(PredictionProgress::Submitting);

        let started = Instant::now();
        match api.predict(record) {
            Ok(prediction) => {
                tracing::info!(elapsed_ms = started.elapsed().as_millis() as u64, "Prediction received");
                let _ = tx.send(PredictionProgress::Complete(PredictionOutcome {
                    prediction,
                    received_at: Local::now(),
                    elapsed: started.elapsed(),
                }));
            }
            Err(e) => {
                tracing::error!(error = %e, "Prediction request failed");
                let _ = tx.send(PredictionProgress::Error(e.to_string()));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::sample_payload;
    use crate::ports::ApiError;
    use std::sync::Mutex;

    /// Scripted API that records what it was sent.
    pub(crate) struct ScriptedApi {
        pub prediction: Result<PredictionRecord, ApiError>,
        pub health: Result<ApiHealth, ApiError>,
        pub received: Mutex<Vec<TrialFeatureRecord>>,
    }

    impl ScriptedApi {
        pub(crate) fn answering(rates: [f64; 3]) -> Self {
            Self {
                prediction: Ok(PredictionRecord {
                    rate_deaths_calc: rates[0],
                    rate_serious_aes_calc: rates[1],
                    rate_other_aes_calc: rates[2],
                }),
                health: Ok(ApiHealth::Healthy),
                received: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing(error: ApiError) -> Self {
            Self {
                prediction: Err(error.clone()),
                health: Err(error),
                received: Mutex::new(Vec::new()),
            }
        }
    }

    impl PredictionApi for ScriptedApi {
        fn predict(&self, record: &TrialFeatureRecord) -> Result<PredictionRecord, ApiError> {
            self.received.lock().unwrap().push(record.clone());
            self.prediction.clone()
        }

        fn health(&self) -> Result<ApiHealth, ApiError> {
            self.health.clone()
        }
    }

    /// Drain a handle until `done` matches or a few seconds pass.
    pub(crate) fn wait_for<T>(handle: &WorkerHandle<T>, done: impl Fn(&T) -> bool) -> Vec<T> {
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut seen = Vec::new();
        while Instant::now() < deadline {
            match handle.progress_rx.recv_timeout(Duration::from_millis(50)) {
                Ok(update) => {
                    let finished = done(&update);
                    seen.push(update);
                    if finished {
                        break;
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        seen
    }

    fn record() -> TrialFeatureRecord {
        TrialFeatureRecord::from_json(&sample_payload()).expect("Should parse")
    }

    #[test]
    fn test_prediction_reports_submitting_then_complete() {
        let api = Arc::new(ScriptedApi::answering([0.012, 0.25, 0.8]));
        let handle = PredictionWorker::spawn(Arc::clone(&api), record());

        let updates = wait_for(&handle, |u| !matches!(u, PredictionProgress::Submitting));
        assert_eq!(updates.first(), Some(&PredictionProgress::Submitting));
        match updates.last() {
            Some(PredictionProgress::Complete(outcome)) => {
                assert_eq!(outcome.prediction.rate_serious_aes_calc, 0.25);
            }
            other => panic!("Expected completion, got {other:?}"),
        }
        assert_eq!(api.received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_prediction_error_is_reported_once() {
        let api = Arc::new(ScriptedApi::failing(ApiError::Server {
            status: 500,
            message: "Model not loaded".to_string(),
        }));
        let handle = PredictionWorker::spawn(api, record());

        let updates = wait_for(&handle, |u| !matches!(u, PredictionProgress::Submitting));
        assert_eq!(
            updates.last(),
            Some(&PredictionProgress::Error(
                "Server error 500: Model not loaded".to_string()
            ))
        );
    }

    #[test]
    fn test_health_maps_to_status() {
        let healthy = PredictionWorker::check_health(Arc::new(ScriptedApi::answering([0.0; 3])));
        assert_eq!(wait_for(&healthy, |_| true), vec![ApiStatus::Healthy]);

        let down = PredictionWorker::check_health(Arc::new(ScriptedApi::failing(
            ApiError::Transport("connection refused".to_string()),
        )));
        assert_eq!(
            wait_for(&down, |_| true),
            vec![ApiStatus::Unreachable(
                "API call failed: connection refused".to_string()
            )]
        );
    }
}
