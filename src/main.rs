mod command;
mod config;
mod error;
mod jobs;
mod link;
mod session;
mod state;
mod telemetry;
mod web;

use anyhow::{Context, Result};
use clap::Parser;
use config::Cli;
use jobs::JobReaper;
use link::SimulatedDriver;
use state::AppState;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = Cli::parse().into_config();
    config.validate().context("invalid configuration")?;

    let driver = Arc::new(SimulatedDriver::new(config.sim.clone()));
    let state = Arc::new(AppState::new(driver, &config));

    info!("Quadlink gateway starting");
    info!("  Default link: {}", config.session.default_uri);
    info!("  Stream period: {:?}", config.stream.period);

    // Spawn job reaper
    let reaper = JobReaper::new(state.jobs.clone(), config.jobs.check_interval);
    let reaper_handle = tokio::spawn(async move {
        reaper.run().await;
    });

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Listening on {}", config.bind);

    axum::serve(listener, web::router(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    reaper_handle.abort();
    let outcome = state.sessions.disconnect().await;
    info!(
        "Shutdown complete: {} ({} telemetry streams still open)",
        outcome.message(),
        state.streamer.active_streams()
    );
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
