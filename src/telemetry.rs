//! Logging setup
//!
//! Thin wrappers over `tracing_subscriber`; library code only emits
//! events and leaves subscriber installation to the embedding binary.

use tracing_subscriber::EnvFilter;

/// Human-readable logs filtered by `RUST_LOG` (default `info`)
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// JSON logs with span context, for production collection
pub fn init_tracing_json() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .init();
}
