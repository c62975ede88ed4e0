//! Diagnostic tracing for the guard engine.
//!
//! Tracing output goes to stderr and is filtered by `RUST_LOG`. Operator-facing
//! progress lines go through [`crate::progress`] and are unaffected by it;
//! review and judge outcomes are persisted under `<route>/.route/`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`; defaults to `warn`. Compact format on stderr.
///
/// # Example
/// ```bash
/// RUST_LOG=guard=debug guard eval 1.vision
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
