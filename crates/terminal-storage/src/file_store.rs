//! File-backed session store with write-verify-promote semantics.
//!
//! Each key maps to one file under the store directory. A write goes to a
//! temp file first, is read back and compared, and only then promoted over
//! the current file. The previous value is kept as a single `.bak`
//! generation so a crash between rotate and promote still leaves a
//! readable record.

use crate::{SessionStore, StorageError, StorageResult};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// File-per-key storage rooted at a single directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> StorageResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> StorageResult<PathBuf> {
        // Keys are fixed constants, but reject separators anyway so a bad
        // caller cannot escape the store directory.
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return Err(StorageError::Encoding(format!("invalid storage key: {key}")));
        }
        Ok(self.dir.join(key))
    }

    fn backup_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".bak");
        path.with_file_name(name)
    }

    fn temp_path(path: &Path) -> PathBuf {
        let mut name = path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        path.with_file_name(name)
    }
}

impl SessionStore for FileStore {
    fn store(&self, key: &str, value: &str) -> StorageResult<()> {
        let path = self.path_for(key)?;
        let tmp = Self::temp_path(&path);

        {
            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }

        // Verify before promoting: the temp file must read back byte-equal.
        let written = fs::read_to_string(&tmp)?;
        if written != value {
            let _ = fs::remove_file(&tmp);
            return Err(StorageError::WriteVerification(format!(
                "read-back mismatch for key {key}"
            )));
        }

        if path.exists() {
            let backup = Self::backup_path(&path);
            if let Err(e) = fs::rename(&path, &backup) {
                warn!(key, error = %e, "Failed to rotate backup before promote");
            }
        }

        fs::rename(&tmp, &path)?;
        debug!(key, bytes = value.len(), "Stored value");
        Ok(())
    }

    fn retrieve(&self, key: &str) -> StorageResult<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                // Unreadable data is treated as absent, per the store contract.
                warn!(key, error = %e, "Unreadable value treated as absent");
                Ok(None)
            }
        }
    }

    fn clear(&self, key: &str) -> StorageResult<bool> {
        let path = self.path_for(key)?;
        let backup = Self::backup_path(&path);
        let _ = fs::remove_file(&backup);
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn has_key(&self, key: &str) -> StorageResult<bool> {
        Ok(self.path_for(key)?.exists())
    }
}
