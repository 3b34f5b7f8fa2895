//! Configuration management for the terminal client.

use crate::{CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default identity provider URL (can be overridden at compile time via PROVIDER_URL env var).
pub const DEFAULT_PROVIDER_URL: &str = match option_env!("PROVIDER_URL") {
    Some(url) => url,
    None => "https://counterline.supabase.co",
};

/// Default provider publishable key (can be overridden at compile time via PROVIDER_PUBLISHABLE_KEY env var).
pub const DEFAULT_PROVIDER_PUBLISHABLE_KEY: &str = match option_env!("PROVIDER_PUBLISHABLE_KEY") {
    Some(key) => key,
    None => "publishable-key",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default period of the session health check, in seconds.
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 300;

/// Main terminal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Identity provider project URL.
    #[serde(default = "default_provider_url")]
    pub provider_url: String,
    /// Provider publishable API key (public, safe to expose).
    #[serde(default = "default_provider_publishable_key")]
    pub provider_publishable_key: String,
    /// Period of the session health check, in seconds.
    #[serde(default = "default_health_check_interval_secs")]
    pub health_check_interval_secs: u64,
}

fn default_provider_url() -> String {
    DEFAULT_PROVIDER_URL.to_string()
}

fn default_provider_publishable_key() -> String {
    DEFAULT_PROVIDER_PUBLISHABLE_KEY.to_string()
}

fn default_health_check_interval_secs() -> u64 {
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            provider_url: DEFAULT_PROVIDER_URL.to_string(),
            provider_publishable_key: DEFAULT_PROVIDER_PUBLISHABLE_KEY.to_string(),
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
        }
    }
}

impl Config {
    /// Create a new Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the config file, falling back to defaults.
    /// Note: provider_url and provider_publishable_key are compile-time
    /// only and always use the built-in defaults, regardless of what's in
    /// the config file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        // Force compile-time values (never from config file)
        config.provider_url = DEFAULT_PROVIDER_URL.to_string();
        config.provider_publishable_key = DEFAULT_PROVIDER_PUBLISHABLE_KEY.to_string();

        config.load_from_env();

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the config file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables. Only log_level
    /// and the health-check interval can change at runtime.
    fn load_from_env(&mut self) {
        if let Ok(log_level) = std::env::var("COUNTERLINE_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(interval) = std::env::var("COUNTERLINE_HEALTH_CHECK_INTERVAL_SECS") {
            if let Ok(secs) = interval.parse() {
                self.health_check_interval_secs = secs;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
        assert_eq!(
            config.health_check_interval_secs,
            DEFAULT_HEALTH_CHECK_INTERVAL_SECS
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("home"));
        let config = Config::load(&paths).unwrap();
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
    }

    #[test]
    fn test_config_file_cannot_override_provider() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("home"));
        paths.ensure_dirs().unwrap();
        std::fs::write(
            paths.config_file(),
            r#"{"log_level":"debug","provider_url":"https://evil.example.com","provider_publishable_key":"stolen"}"#,
        )
        .unwrap();

        let config = Config::load(&paths).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.provider_url, DEFAULT_PROVIDER_URL);
        assert_eq!(
            config.provider_publishable_key,
            DEFAULT_PROVIDER_PUBLISHABLE_KEY
        );
    }

    #[test]
    fn test_save_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("home"));

        let mut config = Config::default();
        config.log_level = "trace".to_string();
        config.health_check_interval_secs = 60;
        config.save(&paths).unwrap();

        let loaded = Config::load_from_file(&paths.config_file()).unwrap();
        assert_eq!(loaded.log_level, "trace");
        assert_eq!(loaded.health_check_interval_secs, 60);
    }
}
