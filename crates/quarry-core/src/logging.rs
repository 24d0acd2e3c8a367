//! Tracing bootstrap.
//!
//! One call from the binary wires up a `fmt` subscriber honoring
//! `RUST_LOG`, with `directives` as the fallback filter.

use tracing_subscriber::EnvFilter;

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence; otherwise `directives` is used
/// (e.g. `"info,quarry_runtime=debug"`). Safe to call more than once —
/// later calls are no-ops.
pub fn init_tracing(directives: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
