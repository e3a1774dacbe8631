//! # fracshare-types
//!
//! Shared types, errors, and configuration for the **FracShare** secondary
//! market settlement engine.
//!
//! This crate is the leaf dependency of the workspace. It defines:
//!
//! - **Identifiers**: [`UserId`], [`PropertyId`], [`OrderId`], [`HoldId`], [`ReservationId`], [`TradeId`], [`IdempotencyToken`]
//! - **Rows**: [`Wallet`], [`Holding`], [`Order`], [`ParkAccount`], [`Hold`], [`Reservation`]
//! - **Audit model**: [`OrderEvent`], [`LedgerTransaction`], [`AuditRecord`]
//! - **Trade model**: [`TradeResult`]
//! - **Collaborator contracts**: [`Actor`], [`Alert`]
//! - **Configuration**: [`EngineConfig`], [`NodeConfig`]
//! - **Errors**: [`FracshareError`] with `FS_ERR_` prefix codes
//! - **Constants**: system-wide limits and defaults

pub mod alert;
pub mod audit;
pub mod config;
pub mod constants;
pub mod error;
pub mod hold;
pub mod holding;
pub mod ids;
pub mod order;
pub mod park;
pub mod trade;
pub mod wallet;

pub use alert::*;
pub use audit::*;
pub use config::*;
pub use error::*;
pub use hold::*;
pub use holding::*;
pub use ids::*;
pub use order::*;
pub use park::*;
pub use trade::*;
pub use wallet::*;

// Constants are accessed via `fracshare_types::constants::FOO`
// (not re-exported to avoid name collisions).
