//! System-wide constants for the FracShare settlement engine.

/// Listing prices are quoted to the cent.
pub const PRICE_PRECISION: u32 = 2;

/// Decimal places kept for weighted-average prices and cost basis.
pub const AVERAGE_PRICE_PRECISION: u32 = 8;

/// Highest accepted listing price per share.
pub const MAX_PRICE_PER_SHARE: u64 = 1_000_000_000;

/// Upper bound on the size of a single listing.
pub const MAX_SHARES_PER_ORDER: u64 = 10_000_000;

/// Longest accepted idempotency token.
pub const MAX_IDEMPOTENCY_TOKEN_LEN: usize = 128;

/// Default hold lifetime.
pub const DEFAULT_HOLD_TTL_MINUTES: i64 = 60;

/// Default reservation lifetime awaiting admin settlement.
pub const DEFAULT_RESERVATION_TTL_HOURS: i64 = 48;

/// Default listing lifetime.
pub const DEFAULT_ORDER_TTL_DAYS: i64 = 30;

/// How long an operation waits for a row lock before giving up.
pub const DEFAULT_LOCK_TIMEOUT_MS: u64 = 2_000;

/// Number of `(order, token)` outcomes kept in memory.
pub const DEFAULT_IDEMPOTENCY_CACHE_SIZE: usize = 100_000;

/// Attempts (including the first) for operations failing on lock contention.
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 3;

/// First retry backoff; doubles per attempt.
pub const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 25;

/// Retry backoff ceiling.
pub const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 500;

/// Reconciler sweep interval.
pub const DEFAULT_RECONCILER_INTERVAL_MS: u64 = 30_000;

/// Stale entities handled per kind per sweep.
pub const DEFAULT_RECONCILER_BATCH_SIZE: usize = 100;

/// Environment variable naming the node's config file.
pub const CONFIG_ENV_VAR: &str = "FRACSHARE_CONFIG";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "FracShare";
