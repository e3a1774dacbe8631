//! Configuration types for the engine and the node binary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{constants, FracshareError, Result};

/// Settlement engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub hold_ttl_minutes: i64,
    pub reservation_ttl_hours: i64,
    pub order_ttl_days: i64,
    pub lock_timeout_ms: u64,
    pub idempotency_cache_size: usize,
    pub retry: RetryConfig,
    pub reconciler: ReconcilerConfig,
    pub protocols: ProtocolConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            hold_ttl_minutes: constants::DEFAULT_HOLD_TTL_MINUTES,
            reservation_ttl_hours: constants::DEFAULT_RESERVATION_TTL_HOURS,
            order_ttl_days: constants::DEFAULT_ORDER_TTL_DAYS,
            lock_timeout_ms: constants::DEFAULT_LOCK_TIMEOUT_MS,
            idempotency_cache_size: constants::DEFAULT_IDEMPOTENCY_CACHE_SIZE,
            retry: RetryConfig::default(),
            reconciler: ReconcilerConfig::default(),
            protocols: ProtocolConfig::default(),
        }
    }
}

impl EngineConfig {
    #[must_use]
    pub fn hold_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.hold_ttl_minutes)
    }

    #[must_use]
    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.reservation_ttl_hours)
    }

    #[must_use]
    pub fn order_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.order_ttl_days)
    }

    #[must_use]
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Reject values that would make the engine misbehave.
    ///
    /// # Errors
    /// `Configuration` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, bool); 8] = [
            ("hold_ttl_minutes", self.hold_ttl_minutes > 0),
            ("reservation_ttl_hours", self.reservation_ttl_hours > 0),
            ("order_ttl_days", self.order_ttl_days > 0),
            ("lock_timeout_ms", self.lock_timeout_ms > 0),
            ("idempotency_cache_size", self.idempotency_cache_size > 0),
            ("retry.max_attempts", self.retry.max_attempts > 0),
            ("reconciler.interval_ms", self.reconciler.interval_ms > 0),
            ("reconciler.batch_size", self.reconciler.batch_size > 0),
        ];
        if let Some((field, _)) = checks.iter().find(|(_, ok)| !ok) {
            return Err(FracshareError::Configuration(format!(
                "{field} must be positive"
            )));
        }
        if !self.protocols.instant_match && !self.protocols.hold_reservation {
            return Err(FracshareError::Configuration(
                "at least one settlement protocol must be enabled".to_string(),
            ));
        }
        Ok(())
    }
}

/// Bounded retry-with-backoff for lock contention.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts including the first one.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: constants::DEFAULT_RETRY_MAX_ATTEMPTS,
            base_backoff_ms: constants::DEFAULT_RETRY_BASE_BACKOFF_MS,
            max_backoff_ms: constants::DEFAULT_RETRY_MAX_BACKOFF_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconcilerConfig {
    pub interval_ms: u64,
    pub batch_size: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            interval_ms: constants::DEFAULT_RECONCILER_INTERVAL_MS,
            batch_size: constants::DEFAULT_RECONCILER_BATCH_SIZE,
        }
    }
}

impl ReconcilerConfig {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

/// Which settlement protocols this deployment accepts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProtocolConfig {
    pub instant_match: bool,
    pub hold_reservation: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            instant_match: true,
            hold_reservation: true,
        }
    }
}

/// Logging output format.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// JSON lines for log aggregation; pretty output otherwise.
    pub json: bool,
}

/// Configuration of the node binary.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NodeConfig {
    pub engine: EngineConfig,
    pub log: LogConfig,
}

impl NodeConfig {
    /// Parse and validate a JSON config document.
    ///
    /// # Errors
    /// `Serialization` for malformed JSON, `Configuration` for invalid values.
    pub fn from_json(raw: &str) -> Result<Self> {
        let cfg: Self = serde_json::from_str(raw)?;
        cfg.engine.validate()?;
        Ok(cfg)
    }
}
