//! Diagnostic tracing for the agent.
//!
//! Reads `RUST_LOG`; defaults to `warn` so replies on stdout stay clean.
//! Output goes to stderr in compact format.
//!
//! # Example
//! ```bash
//! RUST_LOG=twin=debug twin ask "What are your skills?"
//! ```

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber. Safe to call once per process.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
