//! Tracing subscriber for the demo binary.

use tracing_subscriber::{fmt, EnvFilter};

/// Filter used when `RUST_LOG` is unset or does not parse. sqlx logs every
/// statement at `info`, so it is held back to warnings.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the global subscriber. Call once, from main.rs.
pub fn init_logging() {
    fmt()
        .with_env_filter(fleet_filter())
        .with_target(false)
        .compact()
        .init();

    tracing::info!(default_filter = DEFAULT_FILTER, "Logging initialized");
}

fn fleet_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
