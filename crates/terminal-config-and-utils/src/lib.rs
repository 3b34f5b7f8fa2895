//! Core types, configuration, and utilities for the Counterline terminal.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_LOG_LEVEL, DEFAULT_PROVIDER_URL,
    DEFAULT_PROVIDER_PUBLISHABLE_KEY,
};
pub use error::{CoreError, CoreResult};
pub use logging::init_logging;
pub use paths::Paths;
