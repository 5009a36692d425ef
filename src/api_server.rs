// src/api_server.rs

use anyhow::{Context, Result};
use hotel_scanner::config::{Config, LoggingConfig};
use hotel_scanner::server::run_server;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const CONFIG_ENV: &str = "HOTEL_SCANNER_CONFIG";

/// Stdout logging, plus daily-rolling JSON files when a log directory is configured.
fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,hotel_scanner=debug"))
        .context("Invalid log filter")?;

    let file_layer = match &config.directory {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)
                .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
            let file_appender = tracing_appender::rolling::daily(log_dir, "hotel-scanner-api.log");
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(file_appender)
                    .with_ansi(false)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true)
                    .json()
                    .boxed(),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(file_layer)
        .init();

    debug!(directory = ?config.directory, "Logging initialized");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::var(CONFIG_ENV).ok().filter(|p| !p.trim().is_empty()).map(PathBuf::from);
    let config = Config::load(config_path.as_deref())?;

    init_logging(&config.logging)?;
    info!(
        config = ?config_path,
        bind = %config.server.bind,
        providers = config.providers.len(),
        "Starting hotel scanner API"
    );

    run_server(&config).await.context("API server failed")
}
