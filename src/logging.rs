//! Logging setup for the dbquery binary.
//!
//! The library only emits `tracing` events; installing a subscriber is up
//! to the application.

use tracing_subscriber::EnvFilter;

/// Installs a stderr subscriber filtered by `RUST_LOG`, defaulting to `warn`.
///
/// Safe to call more than once; later calls leave the first subscriber in place.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .try_init();
}
