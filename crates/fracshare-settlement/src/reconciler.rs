//! Expiry reconciler.
//!
//! Deadlines are plain data; nothing fires when one passes. This task polls
//! the clock and reverses whatever is overdue:
//!
//! - open holds past `hold_expires_at`
//! - active reservations past `expires_at`
//! - active listings past `expires_at`
//!
//! Candidates are found by a lock-free scan and then processed one per
//! transaction through the same code paths (and lock order) the client
//! operations use, re-checking status and deadline under lock. A failure on
//! one entity is logged and left for the next sweep.

use std::sync::Arc;

use fracshare_types::{HoldId, OrderId, ReconcilerConfig, ReservationId, ReservationStatus};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::SettlementEngine;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub holds_expired: usize,
    pub reservations_expired: usize,
    pub orders_expired: usize,
    pub failures: usize,
}

impl SweepReport {
    pub fn total_expired(&self) -> usize {
        self.holds_expired + self.reservations_expired + self.orders_expired
    }
}

pub struct ExpiryReconciler {
    engine: Arc<SettlementEngine>,
    config: ReconcilerConfig,
}

impl ExpiryReconciler {
    pub fn new(engine: Arc<SettlementEngine>) -> Self {
        let config = engine.config().reconciler.clone();
        Self { engine, config }
    }

    /// One pass over every entity kind, at most `batch_size` of each.
    pub async fn sweep_once(&self) -> SweepReport {
        let now = self.engine.clock().now();
        let store = self.engine.store();
        let mut report = SweepReport::default();

        let holds: Vec<HoldId> = store
            .holds
            .scan(self.config.batch_size, |h| h.status.is_open() && h.is_past_deadline(now))
            .await;
        for id in holds {
            match self.engine.expire_hold(id, now).await {
                Ok(true) => report.holds_expired += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(hold = %id, error = %e, "Hold expiry failed; retrying next sweep");
                }
            }
        }

        let reservations: Vec<ReservationId> = store
            .reservations
            .scan(self.config.batch_size, |r| {
                r.status == ReservationStatus::Active && r.is_past_deadline(now)
            })
            .await;
        for id in reservations {
            match self.engine.expire_reservation(id, now).await {
                Ok(true) => report.reservations_expired += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(reservation = %id, error = %e, "Reservation expiry failed; retrying next sweep");
                }
            }
        }

        let orders: Vec<OrderId> = store
            .orders
            .scan(self.config.batch_size, |o| o.is_active() && o.is_past_deadline(now))
            .await;
        for id in orders {
            match self.engine.expire_order(id, now).await {
                Ok(true) => report.orders_expired += 1,
                Ok(false) => {}
                Err(e) => {
                    report.failures += 1;
                    tracing::warn!(order = %id, error = %e, "Order expiry failed; retrying next sweep");
                }
            }
        }

        if report.total_expired() > 0 || report.failures > 0 {
            tracing::info!(
                holds = report.holds_expired,
                reservations = report.reservations_expired,
                orders = report.orders_expired,
                failures = report.failures,
                "Expiry sweep"
            );
        }
        report
    }

    /// Sweep every `interval_ms` until `shutdown` flips to `true` or its
    /// sender is dropped.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            interval_ms = self.config.interval_ms,
            batch_size = self.config.batch_size,
            "Expiry reconciler started"
        );
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.sweep_once().await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Expiry reconciler stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
