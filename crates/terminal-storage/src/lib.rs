//! Session record storage for the Counterline terminal.
//!
//! The terminal persists exactly one session record at a time, alongside a
//! handful of auxiliary flags, through the [`SessionStore`] trait. The
//! provided [`FileStore`] keeps one file per key with write-verify-promote
//! replacement; platform keystore backends implement the same trait.

mod file_store;
mod keys;
mod traits;

pub use file_store::FileStore;
pub use keys::StorageKeys;
pub use traits::SessionStore;

use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// A written value did not read back identically
    #[error("Write verification failed: {0}")]
    WriteVerification(String),

    /// Platform-specific storage error
    #[error("Platform storage error: {0}")]
    Platform(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory storage for testing.
    pub struct MemoryStore {
        data: Mutex<HashMap<String, String>>,
    }

    impl MemoryStore {
        pub fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    impl SessionStore for MemoryStore {
        fn store(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn retrieve(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn clear(&self, key: &str) -> StorageResult<bool> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();

        store.store("session", "value").unwrap();
        assert_eq!(store.retrieve("session").unwrap(), Some("value".to_string()));
        assert!(store.has_key("session").unwrap());
        assert!(!store.has_key("missing").unwrap());

        assert!(store.clear("session").unwrap());
        assert!(!store.clear("session").unwrap());
        assert_eq!(store.retrieve("session").unwrap(), None);
    }

    #[test]
    fn test_storage_keys_unique() {
        let keys = [
            StorageKeys::SESSION,
            StorageKeys::SESSION_EXPIRES_AT,
            StorageKeys::PERSISTENT_SESSION,
            StorageKeys::NEW_USER,
            StorageKeys::LAST_REFRESH_AT,
        ];
        let unique: std::collections::HashSet<_> = keys.iter().collect();
        assert_eq!(unique.len(), keys.len(), "Storage keys must be unique");
    }
}
