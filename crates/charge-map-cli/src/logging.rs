//! Logging setup for the command-line front end
//!
//! Logs go to stderr so stdout stays clean JSON. With the `profiling` feature the
//! library's profiling scopes are emitted as tracing spans through the same subscriber.

use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Install the global tracing subscriber
///
/// If `RUST_LOG` is not set, a default is set first.
pub fn setup_logging() {
    if std::env::var("RUST_LOG").is_err() {
        // Safety: single-threaded at startup
        unsafe {
            if cfg!(debug_assertions) {
                std::env::set_var("RUST_LOG", "debug,charge_map_lib=debug");
            } else {
                std::env::set_var("RUST_LOG", "warn,charge_map_lib=info");
            }
        }
    }

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(fmt_layer).init();

    tracing::debug!(
        "Tracing initialized (RUST_LOG={})",
        std::env::var("RUST_LOG").unwrap_or_default()
    );
}
