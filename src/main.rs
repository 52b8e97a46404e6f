// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Vitality-Sync background daemon
//!
//! Keeps the signed-in owner's workouts and routes synced from the local
//! SQLite store to Firestore until interrupted.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vitality_sync::{
    config::Config,
    db::{FirestoreRemote, SqliteStore},
    services::{ConnectivityOracle, HttpProbe, SyncConfig, SyncEngine, SyncScheduler},
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    let owner_id = config
        .owner_id
        .clone()
        .ok_or("SYNC_OWNER_ID must be set to run the sync daemon")?;
    tracing::info!(owner_id = %owner_id, "Starting Vitality-Sync");

    // Open the local store
    tracing::info!(path = %config.db_path, "Opening local store");
    let local = Arc::new(SqliteStore::open(&config.db_path)?);

    // Initialize Firestore
    let remote = Arc::new(FirestoreRemote::new(&config.gcp_project_id).await?);

    let oracle: Arc<dyn ConnectivityOracle> = Arc::new(HttpProbe::from_config(&config)?);

    let engine = Arc::new(SyncEngine::new(
        local,
        remote,
        oracle.clone(),
        SyncConfig::from(&config),
    ));

    let cancel = CancellationToken::new();
    let scheduler = SyncScheduler::new(engine, oracle, &owner_id, &config);
    let handle = tokio::spawn(scheduler.run(cancel.clone()));

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    cancel.cancel();
    handle.await?;

    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("vitality_sync=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
