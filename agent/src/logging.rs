//! Diagnostic tracing for the agent.
//!
//! Tracing output goes to stderr and is controlled by `RUST_LOG`. It is
//! separate from the evaluation debug log (`io/debug_log`), which is a
//! user-configured file.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn`, or `agent=debug` when `debug` is set.
///
/// # Example
/// ```bash
/// RUST_LOG=agent::session=debug agent -p "list files"
/// ```
pub fn init(debug: bool) {
    let default = if debug { "agent=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
