//! Globally unique identifiers used throughout FracShare.
//!
//! Entity IDs use UUIDv7 so they sort by creation time. Wallet lock
//! ordering relies on [`UserId`] being totally ordered.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{constants, FracshareError, Result};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an investor account.
    UserId,
    "user"
);

uuid_id!(
    /// Identifier of a property in the external catalog.
    PropertyId,
    "prop"
);

uuid_id!(
    /// Sell listing identifier.
    OrderId,
    "order"
);

uuid_id!(
    /// Buyer hold identifier.
    HoldId,
    "hold"
);

uuid_id!(
    /// Reservation identifier.
    ReservationId,
    "resv"
);

uuid_id!(
    /// Identifier of an executed trade (instant match or settled reservation).
    TradeId,
    "trade"
);

uuid_id!(
    /// Identifier of a single ledger transaction row.
    TransactionId,
    "tx"
);

// ---------------------------------------------------------------------------
// IdempotencyToken
// ---------------------------------------------------------------------------

/// Caller-supplied (or server-generated) token that makes a retried
/// financial request safe to resend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    /// Wrap a client-supplied token.
    ///
    /// # Errors
    /// Returns `InvalidToken` if the token is empty or longer than
    /// [`constants::MAX_IDEMPOTENCY_TOKEN_LEN`].
    pub fn parse(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.len() > constants::MAX_IDEMPOTENCY_TOKEN_LEN {
            return Err(FracshareError::InvalidToken {
                reason: format!(
                    "token must be 1..={} characters",
                    constants::MAX_IDEMPOTENCY_TOKEN_LEN
                ),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Server-side token for callers that did not supply one.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
