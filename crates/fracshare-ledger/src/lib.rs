//! # fracshare-ledger
//!
//! Durable state of the FracShare engine and the single-table operations on
//! it.
//!
//! ## Components
//!
//! - [`store`]: row tables with per-row async locks and stage/commit guards
//! - [`audit_log`]: append-only SHA-256 hash chain of order events and
//!   balance movements
//! - [`wallet_ledger`]: wallet funding and single-wallet balance moves
//! - [`order_book`]: listings and the share park that prevents overselling
//! - [`catalog`] / [`notify`]: collaborator contracts (property catalog,
//!   alert sink)
//! - [`clock`]: injectable time source

pub mod audit_log;
pub mod catalog;
pub mod clock;
pub mod notify;
pub mod order_book;
pub mod store;
pub mod wallet_ledger;

pub use audit_log::AuditLog;
pub use catalog::{InMemoryCatalog, PropertyCatalog, PropertyListing};
#[cfg(any(test, feature = "test-helpers"))]
pub use clock::ManualClock;
pub use clock::{Clock, SystemClock};
#[cfg(any(test, feature = "test-helpers"))]
pub use notify::RecordingSink;
pub use notify::{NotificationSink, TracingSink};
pub use order_book::OrderBook;
pub use store::{PositionKey, RowGuard, Store, Table};
pub use wallet_ledger::WalletLedger;
