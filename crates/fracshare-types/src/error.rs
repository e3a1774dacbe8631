//! Error types for the FracShare settlement engine.
//!
//! All errors use the `FS_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by class:
//! - 1xx: Validation (user-fixable input problems)
//! - 2xx: State (entity not in a state that permits the operation)
//! - 3xx: Resource (insufficient funds or shares)
//! - 4xx: Concurrency (lock contention, retryable)
//! - 5xx: Integrity (should be unreachable, page an operator)
//! - 9xx: General / internal errors

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::{
    HoldId, HoldStatus, OrderId, OrderStatus, PropertyId, ReservationId, ReservationStatus,
    UserId,
};

/// Classification used by callers to decide how to react to an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    State,
    Resource,
    Concurrency,
    Integrity,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::State => write!(f, "STATE"),
            Self::Resource => write!(f, "RESOURCE"),
            Self::Concurrency => write!(f, "CONCURRENCY"),
            Self::Integrity => write!(f, "INTEGRITY"),
            Self::Internal => write!(f, "INTERNAL"),
        }
    }
}

/// Central error enum for all FracShare operations.
#[derive(Debug, Error)]
pub enum FracshareError {
    // =================================================================
    // Validation (1xx)
    // =================================================================
    /// Share count was zero or above the listing limit.
    #[error("FS_ERR_100: Invalid share count: {reason}")]
    InvalidShares { reason: String },

    /// Price was non-positive or had too many decimal places.
    #[error("FS_ERR_101: Invalid price {price}: {reason}")]
    InvalidPrice { price: Decimal, reason: String },

    /// A ledger amount was non-positive.
    #[error("FS_ERR_102: Invalid amount {amount}: must be positive")]
    InvalidAmount { amount: Decimal },

    /// The idempotency token was malformed.
    #[error("FS_ERR_103: Invalid idempotency token: {reason}")]
    InvalidToken { reason: String },

    // =================================================================
    // State (2xx)
    // =================================================================
    #[error("FS_ERR_200: Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("FS_ERR_201: Order {order} is {status}, not ACTIVE")]
    OrderNotActive { order: OrderId, status: OrderStatus },

    #[error("FS_ERR_202: Order {0} has expired")]
    OrderExpired(OrderId),

    #[error("FS_ERR_203: Hold not found: {0}")]
    HoldNotFound(HoldId),

    #[error("FS_ERR_204: Hold {hold} is {status}")]
    HoldNotActive { hold: HoldId, status: HoldStatus },

    #[error("FS_ERR_205: Hold {0} has expired")]
    HoldExpired(HoldId),

    #[error("FS_ERR_206: Hold {0} is already confirmed by the buyer")]
    HoldAlreadyConfirmed(HoldId),

    #[error("FS_ERR_207: Hold {0} has not been confirmed by the buyer")]
    BuyerNotConfirmed(HoldId),

    #[error("FS_ERR_208: Reservation not found: {0}")]
    ReservationNotFound(ReservationId),

    #[error("FS_ERR_209: Reservation {reservation} is {status}, not ACTIVE")]
    ReservationNotActive {
        reservation: ReservationId,
        status: ReservationStatus,
    },

    /// Buyer and seller are the same user.
    #[error("FS_ERR_210: Self-trade prevented: buyer is the seller")]
    SelfTrade,

    /// The acting user may not perform this operation.
    #[error("FS_ERR_211: Forbidden: {reason}")]
    Forbidden { reason: String },

    /// A reservation is pending on the order; cancelling would orphan it.
    #[error("FS_ERR_212: Order {0} has confirmed holds awaiting settlement")]
    HasConfirmedHolds(OrderId),

    #[error("FS_ERR_213: Trading is disabled for property {0}")]
    TradingDisabled(PropertyId),

    #[error("FS_ERR_214: Settlement protocol disabled: {0}")]
    ProtocolDisabled(String),

    #[error("FS_ERR_215: Wallet already exists for {0}")]
    WalletAlreadyExists(UserId),

    // =================================================================
    // Resource (3xx)
    // =================================================================
    #[error("FS_ERR_300: Insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        required: Decimal,
        available: Decimal,
    },

    #[error("FS_ERR_301: Insufficient free shares: requested {requested}, free {free}")]
    InsufficientFreeShares { requested: u64, free: u64 },

    #[error(
        "FS_ERR_302: Insufficient remaining shares: requested {requested}, remaining {remaining}"
    )]
    InsufficientRemainingShares { requested: u64, remaining: u64 },

    // =================================================================
    // Concurrency (4xx)
    // =================================================================
    /// A row lock could not be acquired in time. Retry the whole operation.
    #[error("FS_ERR_400: Lock timeout on {resource}")]
    LockTimeout { resource: String },

    // =================================================================
    // Integrity (5xx)
    // =================================================================
    #[error("FS_ERR_500: Data integrity violation: {reason}")]
    DataIntegrity { reason: String },

    #[error("FS_ERR_501: Wallet not found for {0}")]
    WalletNotFound(UserId),

    #[error("FS_ERR_502: Pending underflow for {user}: release {requested}, pending {pending}")]
    PendingUnderflow {
        user: UserId,
        requested: Decimal,
        pending: Decimal,
    },

    #[error("FS_ERR_503: Audit chain broken at sequence {seq}")]
    AuditChainBroken { seq: u64 },

    #[error("FS_ERR_504: Conservation invariant violated: {reason}")]
    ConservationViolation { reason: String },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    #[error("FS_ERR_900: Internal error: {0}")]
    Internal(String),

    #[error("FS_ERR_901: Serialization error: {0}")]
    Serialization(String),

    #[error("FS_ERR_902: Configuration error: {0}")]
    Configuration(String),

    #[error("FS_ERR_903: I/O error: {0}")]
    Io(String),
}

impl FracshareError {
    /// The error class, used for retry and presentation decisions.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidShares { .. }
            | Self::InvalidPrice { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidToken { .. } => ErrorKind::Validation,

            Self::OrderNotFound(_)
            | Self::OrderNotActive { .. }
            | Self::OrderExpired(_)
            | Self::HoldNotFound(_)
            | Self::HoldNotActive { .. }
            | Self::HoldExpired(_)
            | Self::HoldAlreadyConfirmed(_)
            | Self::BuyerNotConfirmed(_)
            | Self::ReservationNotFound(_)
            | Self::ReservationNotActive { .. }
            | Self::SelfTrade
            | Self::Forbidden { .. }
            | Self::HasConfirmedHolds(_)
            | Self::TradingDisabled(_)
            | Self::ProtocolDisabled(_)
            | Self::WalletAlreadyExists(_) => ErrorKind::State,

            Self::InsufficientFunds { .. }
            | Self::InsufficientFreeShares { .. }
            | Self::InsufficientRemainingShares { .. } => ErrorKind::Resource,

            Self::LockTimeout { .. } => ErrorKind::Concurrency,

            Self::DataIntegrity { .. }
            | Self::WalletNotFound(_)
            | Self::PendingUnderflow { .. }
            | Self::AuditChainBroken { .. }
            | Self::ConservationViolation { .. } => ErrorKind::Integrity,

            Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Only lock contention is worth retrying; business-rule failures are not
    /// transient.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Concurrency
    }

    /// Message safe to show to the end user. Integrity and internal failures
    /// are opaque; their detail stays in the logs.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self.kind() {
            ErrorKind::Integrity | ErrorKind::Internal => {
                "The operation could not be completed. Support has been notified.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, FracshareError>;

impl From<std::io::Error> for FracshareError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FracshareError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
