//! Development-time tracing.
//!
//! - **Tracing (this module)**: diagnostics via `RUST_LOG`, written to stderr.
//!   Not part of the product output.
//! - **Run log (`io/run_log`)**: prompts and agent outputs under
//!   `.scribe/runs/`. Always written, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`. Defaults to `warn`, or `scribe=debug` when `verbose` is set.
///
/// # Example
/// ```bash
/// RUST_LOG=scribe=debug scribe status
/// ```
pub fn init(verbose: bool) {
    let fallback = if verbose { "warn,scribe=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
