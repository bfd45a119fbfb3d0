//! Glimpse: diabetes and heart-disease risk service.
//!
//! Main entry point for the HTTP server.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use glimpse::adapters::sanitize::SanitizingMakeWriter;
use glimpse::adapters::sqlite::SqliteStorage;
use glimpse::application::ModelRegistry;
use glimpse::config::{Config, LogMode};
use glimpse::domain::PasswordPolicy;
use glimpse::server::{self, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Invalid configuration")?;

    // Logs go through the sanitizing writer regardless of sink.
    let (writer, _guard) = match config.log_mode {
        LogMode::File => {
            if let Some(parent) = config.log_file.parent() {
                // Best-effort: a missing directory shows up as the open error below.
                let _ = std::fs::create_dir_all(parent);
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&config.log_file)
                .with_context(|| format!("Cannot open log file {:?}", config.log_file))?;
            tracing_appender::non_blocking(file)
        }
        LogMode::Stdout => tracing_appender::non_blocking(std::io::stdout()),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(SanitizingMakeWriter::new(writer)))
        .init();

    tracing::info!("Starting Glimpse...");

    // Models are required; the service does not start without them.
    let models = ModelRegistry::load(&config.model_dir, config.require_manifest)
        .with_context(|| format!("Failed to load models from {:?}", config.model_dir))?;

    let storage = SqliteStorage::new(&config.db_path)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;
    tracing::info!("Database ready at {:?}", config.db_path);

    let state = AppState::new(models, storage, PasswordPolicy::default());
    let addr = SocketAddr::new(config.bind_addr, config.port);
    server::serve(addr, state, &config.cors_origins).await?;

    tracing::info!("Glimpse shutdown complete.");
    Ok(())
}
