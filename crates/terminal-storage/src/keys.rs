//! Storage key constants.

/// Storage keys used by the terminal client.
pub struct StorageKeys;

impl StorageKeys {
    /// Serialized session record (JSON)
    pub const SESSION: &'static str = "session";

    /// Absolute session expiry (RFC 3339 UTC)
    pub const SESSION_EXPIRES_AT: &'static str = "session_expires_at";

    /// Whether the user opted into "remember me"
    pub const PERSISTENT_SESSION: &'static str = "is_persistent_session";

    /// Whether the signed-in user is new (no organization yet)
    pub const NEW_USER: &'static str = "is_new_user";

    /// Last successful token refresh (RFC 3339 UTC)
    pub const LAST_REFRESH_AT: &'static str = "last_refresh_at";
}
