//! Local session state: save, load, clear, and expiry arithmetic.

use crate::clock::Clock;
use crate::session::{Session, SessionRecord};
use crate::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use terminal_storage::{SessionStore, StorageKeys};
use tracing::{debug, warn};

/// Refresh threshold for sessions without "remember me".
pub const STANDARD_REFRESH_THRESHOLD_SECS: i64 = 300;

/// Refresh threshold for persistent sessions (12 hours).
pub const PERSISTENT_REFRESH_THRESHOLD_SECS: i64 = 12 * 60 * 60;

/// Sessions expired longer ago than this are force-cleared; the refresh
/// token is assumed expired server-side as well.
pub const SEVERE_EXPIRY_GRACE_DAYS: i64 = 30;

/// Owns the persisted session record and the expiry/threshold policy.
///
/// All time arithmetic goes through the injected [`Clock`]; all persistence
/// through the injected [`SessionStore`]. Exactly one record exists at a
/// time: it is either present (authenticated) or absent (logged out).
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn SessionStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Persist a session, computing the absolute expiry at save time.
    ///
    /// An unusable session (empty access token) falls back to
    /// [`clear_session`](Self::clear_session) so no partial state lands in
    /// the store.
    pub fn save_session(&self, session: &Session, is_persistent: bool) -> AuthResult<()> {
        if !session.is_usable() {
            warn!("Refusing to save unusable session, clearing instead");
            self.clear_session();
            return Ok(());
        }

        let json = serde_json::to_string(session)?;
        self.store.store(StorageKeys::SESSION, &json)?;

        let now = self.clock.now_utc();
        if session.expires_in_seconds > 0 {
            let expiry = now + Duration::seconds(session.expires_in_seconds);
            self.store
                .store(StorageKeys::SESSION_EXPIRES_AT, &expiry.to_rfc3339())?;
        } else {
            let _ = self.store.clear(StorageKeys::SESSION_EXPIRES_AT);
        }

        self.store.store(
            StorageKeys::PERSISTENT_SESSION,
            if is_persistent { "true" } else { "false" },
        )?;
        self.store
            .store(StorageKeys::LAST_REFRESH_AT, &now.to_rfc3339())?;

        debug!(
            user_id = %session.user.id,
            is_persistent,
            "Session saved"
        );
        Ok(())
    }

    /// Load the persisted record.
    ///
    /// Returns `None` when no record exists, the access token is empty, or
    /// the stored data cannot be deserialized. Corruption reads as
    /// logged-out, never as an error.
    pub fn load_session(&self) -> Option<SessionRecord> {
        let json = match self.store.retrieve(StorageKeys::SESSION) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Session retrieve failed, treating as absent");
                return None;
            }
        };

        let session: Session = match serde_json::from_str(&json) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Corrupt session record, treating as absent");
                return None;
            }
        };

        if !session.is_usable() {
            return None;
        }

        let absolute_expiry_utc = self
            .retrieve_timestamp(StorageKeys::SESSION_EXPIRES_AT)
            .or_else(|| session.computed_expiry_utc());

        Some(SessionRecord {
            absolute_expiry_utc,
            is_persistent: self.retrieve_flag(StorageKeys::PERSISTENT_SESSION),
            is_new_user: self.retrieve_flag(StorageKeys::NEW_USER),
            last_refresh_utc: self.retrieve_timestamp(StorageKeys::LAST_REFRESH_AT),
            session,
        })
    }

    /// Remove every persisted key. Idempotent.
    pub fn clear_session(&self) {
        for key in [
            StorageKeys::SESSION,
            StorageKeys::SESSION_EXPIRES_AT,
            StorageKeys::PERSISTENT_SESSION,
            StorageKeys::NEW_USER,
            StorageKeys::LAST_REFRESH_AT,
        ] {
            if let Err(e) = self.store.clear(key) {
                warn!(key, error = %e, "Failed to clear storage key");
            }
        }
    }

    /// Absolute expiry of the persisted session.
    ///
    /// Prefers the expiry stored at save time; falls back to
    /// `created_at + expires_in`. `None` when neither is derivable.
    pub fn expiry_time_utc(&self) -> Option<DateTime<Utc>> {
        let record = self.load_session()?;
        record
            .absolute_expiry_utc
            .or_else(|| record.session.computed_expiry_utc())
    }

    /// Whether the persisted session is past its expiry.
    pub fn is_expired(&self) -> bool {
        match self.expiry_time_utc() {
            Some(expiry) => self.clock.now_utc() > expiry,
            None => false,
        }
    }

    /// Seconds of remaining lifetime below which a refresh is due.
    pub fn refresh_threshold_secs(&self) -> i64 {
        if self.retrieve_flag(StorageKeys::PERSISTENT_SESSION) {
            PERSISTENT_REFRESH_THRESHOLD_SECS
        } else {
            STANDARD_REFRESH_THRESHOLD_SECS
        }
    }

    /// Persist the new-user flag, independent of session validity.
    pub fn set_user_new_state(&self, is_new: bool) -> AuthResult<()> {
        self.store
            .store(StorageKeys::NEW_USER, if is_new { "true" } else { "false" })
            .map_err(AuthError::from)
    }

    /// Read the persisted new-user flag; absent or unreadable reads as false.
    pub fn user_new_state(&self) -> bool {
        self.retrieve_flag(StorageKeys::NEW_USER)
    }

    fn retrieve_flag(&self, key: &str) -> bool {
        matches!(self.store.retrieve(key), Ok(Some(value)) if value == "true")
    }

    fn retrieve_timestamp(&self, key: &str) -> Option<DateTime<Utc>> {
        let value = self.store.retrieve(key).ok().flatten()?;
        match DateTime::parse_from_rfc3339(&value) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(e) => {
                warn!(key, error = %e, "Unparseable stored timestamp");
                None
            }
        }
    }
}
