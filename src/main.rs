//! Trialsafe: Clinical trial adverse event prediction
//!
//! Main entry point for the terminal client.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use trialsafe::config::ClientConfig;
use trialsafe::tui::App;

fn main() -> Result<()> {
    let config = ClientConfig::from_env().context("Invalid client configuration")?;

    // Writing logs to the terminal would corrupt the alternate screen:
    // - interactive TTY: log to a file
    // - non-interactive: log to stdout
    let interactive = std::io::stdout().is_terminal();

    let (writer, _guard) = if config.log_mode.use_file(interactive) {
        if let Some(parent) = config.log_file.parent() {
            let _ = std::fs::create_dir_all(parent);
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&config.log_file)
            .with_context(|| format!("Failed to open log file {}", config.log_file.display()))?;
        tracing_appender::non_blocking(file)
    } else {
        tracing_appender::non_blocking(std::io::stdout())
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();

    tracing::info!(api_url = %config.api_url, "Starting trialsafe client...");

    let mut app = App::new(&config)?;
    app.run()?;

    tracing::info!("trialsafe client shutdown complete.");
    Ok(())
}
