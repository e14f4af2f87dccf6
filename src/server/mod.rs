//! HTTP inference service.
//!
//! The model is loaded once before the listener starts and is shared
//! read-only between handlers.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use crate::application::InferenceService;
use crate::ports::Regressor;

pub use routes::{build_router, LIVENESS_MESSAGE};

/// Serve until Ctrl+C.
///
/// # Errors
/// Returns an I/O error if the address cannot be bound or the server fails.
pub async fn serve<R>(addr: SocketAddr, service: Arc<InferenceService<R>>) -> std::io::Result<()>
where
    R: Regressor + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, build_router(service))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
