//! Tracing initialization for embedding applications.
//!
//! The crate itself only emits `tracing` events (one structured access-log
//! line per response, plus parse/dispatch diagnostics); installing a
//! subscriber is the embedder's choice. These helpers cover the common
//! cases and respect `RUST_LOG` when set.

use tracing_subscriber::EnvFilter;

/// Install a human-readable subscriber. `default_filter` applies when
/// `RUST_LOG` is unset (e.g. `"info"` or `"shellac=debug"`).
///
/// Safe to call more than once; later calls are no-ops.
pub fn init(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}

/// Install a JSON-lines subscriber, one object per event, for log
/// shippers.
pub fn init_json(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init();
}
