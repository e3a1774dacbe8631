//! Tracing initialization.
//!
//! Two output modes, both filtered by `RUST_LOG` (default `info`):
//! - **JSON** (`log.json = true`): one object per line with microsecond UTC
//!   timestamps, for log aggregation.
//! - **Pretty** (`log.json = false`): human-readable output for local runs.

use std::fmt;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_tracing(json: bool) -> bool {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);

    if json {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_timer(UtcMicros)
            .with_target(true)
            .with_current_span(false);
        registry.with(layer).try_init().is_ok()
    } else {
        let layer = tracing_subscriber::fmt::layer().pretty().with_target(false);
        registry.with(layer).try_init().is_ok()
    }
}

#[derive(Debug, Clone, Copy)]
struct UtcMicros;

impl tracing_subscriber::fmt::time::FormatTime for UtcMicros {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> fmt::Result {
        write!(w, "{}", chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ"))
    }
}
