//! File system paths for the terminal client.

use crate::{CoreError, CoreResult};
use std::path::PathBuf;

/// Manages file system paths for the terminal client.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Base directory for terminal runtime files (~/.counterline)
    base_dir: PathBuf,
}

impl Paths {
    /// Create a new Paths instance rooted at `~/.counterline`.
    pub fn new() -> CoreResult<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| CoreError::Path("Could not determine home directory".to_string()))?;

        Ok(Self {
            base_dir: home.join(".counterline"),
        })
    }

    /// Create a new Paths instance with a custom base directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Get the base directory (~/.counterline).
    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the config file path (~/.counterline/config.json).
    pub fn config_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Get the session store directory (~/.counterline/session).
    pub fn session_store_dir(&self) -> PathBuf {
        self.base_dir.join("session")
    }

    /// Get the log directory (~/.counterline/logs).
    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }

    /// Ensure all directories exist.
    pub fn ensure_dirs(&self) -> CoreResult<()> {
        std::fs::create_dir_all(&self.base_dir)?;
        std::fs::create_dir_all(self.session_store_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_layout() {
        let paths = Paths::with_base_dir(PathBuf::from("/tmp/counterline-test"));
        assert_eq!(
            paths.config_file(),
            PathBuf::from("/tmp/counterline-test/config.json")
        );
        assert_eq!(
            paths.session_store_dir(),
            PathBuf::from("/tmp/counterline-test/session")
        );
        assert_eq!(
            paths.log_dir(),
            PathBuf::from("/tmp/counterline-test/logs")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths::with_base_dir(dir.path().join("home"));
        paths.ensure_dirs().unwrap();
        assert!(paths.session_store_dir().is_dir());
        assert!(paths.log_dir().is_dir());
    }
}
