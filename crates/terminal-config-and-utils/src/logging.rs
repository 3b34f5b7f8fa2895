//! Logging initialization for the terminal client.
//!
//! Installs a `tracing` subscriber with env-filter support. The level comes
//! from `RUST_LOG` when set, otherwise from the provided default.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging system.
///
/// # Arguments
///
/// * `level` - Default log level (trace, debug, info, warn, error)
/// * `json` - Emit structured JSON lines instead of human-readable output
///
/// # Example
///
/// ```ignore
/// init_logging("info", false);
/// tracing::info!("Terminal started");
/// ```
pub fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    // A second init (e.g. in tests) is not an error worth surfacing.
    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
