//! Structured logging setup (C11): one call at process startup, reading
//! `RUST_LOG` the way every other component in this stack does.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber. Safe to call once per
/// process; subsequent calls are no-ops if a subscriber is already set.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
