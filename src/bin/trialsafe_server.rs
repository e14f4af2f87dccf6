//! Trialsafe inference server.
//!
//! Loads the model directory once, then serves `/`, `/health`, `/predict`
//! and `/debug`. A model that fails to load leaves the server running in a
//! degraded state that reports unhealthy.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trialsafe::application::InferenceService;
use trialsafe::config::ServerConfig;
use trialsafe::server;

#[tokio::main]
async fn main() -> Result<()> {
    let (writer, _guard) = tracing_appender::non_blocking(std::io::stdout());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(writer))
        .init();

    let config = ServerConfig::from_env().context("Invalid server configuration")?;
    tracing::info!(
        model_path = %config.model_path.display(),
        bind_addr = %config.bind_addr,
        "Starting Trialsafe server..."
    );

    let model_path = config.model_path.clone();
    let service = tokio::task::spawn_blocking(move || InferenceService::load(&model_path))
        .await
        .context("Model loading task failed")?;
    if let Some(reason) = service.unavailable_reason() {
        tracing::warn!(%reason, "Serving without a model; /predict will fail");
    }

    server::serve(config.bind_addr, Arc::new(service))
        .await
        .with_context(|| format!("Server on {} failed", config.bind_addr))?;

    tracing::info!("Trialsafe server shutdown complete.");
    Ok(())
}
