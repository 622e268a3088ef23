//! essem-eh (Essence Event Handler) - Essence lifecycle event worker
//!
//! Listens on one queue for essence linked/unlinked/deleted events, checks
//! linked essences against the media repository, and publishes a
//! get-metadata request for each qualifying linked event. One message is
//! processed at a time; the broker's prefetch window bounds what it may
//! hold in flight.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use essem_common::config::Config;
use essem_eh::dispatch::Dispatcher;
use essem_eh::services::rabbit::RabbitClient;
use essem_eh::services::repository::RepositoryClient;
use tracing::{error, info};

/// Command-line arguments for essem-eh
#[derive(Parser, Debug)]
#[command(name = "essem-eh")]
#[command(about = "Essence event handler worker for essem")]
#[command(version)]
struct Args {
    /// Path to the TOML config file
    #[arg(short, long, env = "ESSEM_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init
    info!(
        "Starting Essem Event Handler (essem-eh) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;

    let repository =
        RepositoryClient::new(&config.repository).context("Failed to build repository client")?;
    info!(base_url = %config.repository.base_url, "Repository client ready");

    // Unreachable broker at boot is fatal; per-message errors are not.
    let rabbit = RabbitClient::connect(&config.amqp)
        .await
        .context("Failed to connect to broker")?;

    // Health endpoint on a background task
    let app = essem_eh::build_router();
    let listener = tokio::net::TcpListener::bind(&config.health.listen)
        .await
        .with_context(|| format!("Failed to bind health endpoint {}", config.health.listen))?;
    info!("Health check: http://{}/health", config.health.listen);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Health endpoint terminated: {}", e);
        }
    });

    let dispatcher = Dispatcher::new(repository, rabbit.clone(), config.amqp.routing.clone());

    tokio::select! {
        result = rabbit.run(&dispatcher) => {
            result.context("Consumer stream ended")?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received, stopping consumer");
        }
    }

    Ok(())
}
