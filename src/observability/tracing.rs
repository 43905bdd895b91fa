//! Structured logging setup.
//!
//! The library itself only emits `tracing` events (worker start/stop, sink
//! failures, shutdown); hosts install their own subscriber. These helpers
//! are for the load generator and for tests.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing for a standalone process.
///
/// `default_filter` applies when `RUST_LOG` is unset. With `json` set, events
/// are written as one JSON object per line.
///
/// # Panics
///
/// Panics if tracing has already been initialized.
pub fn init_tracing(default_filter: &str, json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_thread_names(true))
            .init();
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .init();
    }

    tracing::debug!(filter = default_filter, json, "Tracing initialized");
}

/// Initialize tracing for tests (only logs errors).
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("error")
        .with_test_writer()
        .try_init();
}
