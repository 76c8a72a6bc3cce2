// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Segment Scout API Server
//!
//! Local dashboard backend: connects Strava accounts, scans recent rides
//! for segment efforts, and searches for nearby beatable segments.

use segment_scout::{
    cancel::CancelToken,
    config::Config,
    db::{CredentialStore, FileBackend},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Segment Scout API");

    // Open the credential store
    tracing::info!(path = %config.data_dir.display(), "Opening credential store");
    let store = CredentialStore::open(FileBackend::new(&config.data_dir));

    // Build shared state
    let state = Arc::new(AppState::new(config.clone(), store));

    // Keep the current credential's token fresh
    let shutdown = CancelToken::new();
    let scheduler = state
        .session
        .clone()
        .spawn_refresh_scheduler(shutdown.clone());

    // Build router
    let app = segment_scout::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Shutdown requested");
            }
            signal.cancel();
        })
        .await?;

    shutdown.cancel();
    scheduler.await?;
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("segment_scout=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
