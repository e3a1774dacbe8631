//! FracShare settlement node.
//!
//! Loads configuration, initializes tracing, builds the settlement engine
//! and runs the expiry reconciler until interrupted.
//!
//! The node exposes no client API, so it starts with an empty
//! `InMemoryCatalog`: no property is tradable until an embedding service
//! registers listings through `InMemoryCatalog::upsert`.

mod config;
mod logging;

use std::sync::Arc;

use fracshare_ledger::{InMemoryCatalog, SystemClock, TracingSink};
use fracshare_settlement::{ExpiryReconciler, SettlementEngine};
use fracshare_types::{constants, FracshareError, Result};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> Result<()> {
    let (config, path) = config::load_from_env()?;
    logging::init_tracing(config.log.json);

    tracing::info!(
        engine = constants::ENGINE_NAME,
        version = constants::VERSION,
        config = ?path,
        hold_ttl_minutes = config.engine.hold_ttl_minutes,
        reservation_ttl_hours = config.engine.reservation_ttl_hours,
        instant_match = config.engine.protocols.instant_match,
        hold_reservation = config.engine.protocols.hold_reservation,
        "Starting settlement node"
    );

    tracing::warn!("Property catalog is empty; no property is tradable");
    let engine = Arc::new(SettlementEngine::new(
        config.engine,
        Arc::new(InMemoryCatalog::new()),
        Arc::new(TracingSink),
        Arc::new(SystemClock),
    )?);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler = ExpiryReconciler::new(engine.clone()).spawn(shutdown_rx);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Received SIGINT, shutting down");

    // A send error only means the reconciler already exited.
    let _ = shutdown_tx.send(true);
    reconciler
        .await
        .map_err(|e| FracshareError::Internal(format!("reconciler task failed: {e}")))?;

    match engine.verify_conservation().await {
        Ok(report) => tracing::info!(
            supply = %report.actual_supply,
            audit_records = report.audit_records,
            "Final conservation check passed"
        ),
        Err(e) => tracing::error!(error = %e, "Final conservation check failed"),
    }
    tracing::info!("Node stopped");
    Ok(())
}
