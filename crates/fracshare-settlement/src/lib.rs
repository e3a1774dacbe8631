//! # fracshare-settlement
//!
//! Settlement engine for secondary-market trades of fractional property
//! shares.
//!
//! ## Protocols
//!
//! - **Instant match**: the buyer pays the listing price and receives the
//!   shares in one transaction.
//! - **Hold / reservation**: the buyer's cash is escrowed while buyer and
//!   seller confirm; the confirmed reservation is settled (or rejected) by
//!   an admin after the off-platform payment is checked.
//!
//! Both run against the row store of `fracshare-ledger` with a fixed lock
//! order, rollback-by-drop and bounded retry on lock contention. The
//! [`ExpiryReconciler`] reverses holds, reservations and listings whose
//! deadlines pass, and [`ConservationChecker`] verifies that cash and shares
//! were neither created nor destroyed.

pub mod conservation;
pub mod engine;
pub mod hold;
pub mod idempotency;
pub mod instant_match;
pub mod reconciler;
pub mod reservation;
pub mod retry;
mod transfer;

pub use conservation::{ConservationChecker, ConservationReport, SupplyConservation};
pub use engine::SettlementEngine;
pub use idempotency::{IdempotencyGuard, Outcome};
pub use reconciler::{ExpiryReconciler, SweepReport};
pub use retry::RetryPolicy;
