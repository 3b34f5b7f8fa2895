//! Identity provider interface.
//!
//! The coordinator consumes the provider purely through this trait; the wire
//! protocol, retry policy, and timeouts live inside implementations.

use crate::session::Session;
use crate::AuthResult;
use async_trait::async_trait;

/// Capability set the auth coordinator requires from the identity provider.
///
/// Sign-in style operations return `Ok(None)` when the provider answered
/// but produced no usable session (e.g. an empty token payload); definitive
/// rejections and transport failures are errors.
#[async_trait]
pub trait IdentityProviderClient: Send + Sync {
    /// Whether the provider client has finished initializing.
    ///
    /// Providers that restore their own state asynchronously report `false`
    /// until ready; the coordinator reconciles once readiness flips.
    fn is_ready(&self) -> bool {
        true
    }

    /// Email/password sign-in.
    async fn sign_in_password(&self, email: &str, password: &str)
        -> AuthResult<Option<Session>>;

    /// Email/password registration.
    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<Session>>;

    /// Request an SMS one-time password.
    async fn request_otp(&self, phone: &str) -> AuthResult<()>;

    /// Verify an SMS one-time password.
    async fn verify_otp(&self, phone: &str, code: &str) -> AuthResult<Option<Session>>;

    /// Exchange a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Option<Session>>;

    /// Invalidate the session server-side.
    async fn sign_out(&self, access_token: &str) -> AuthResult<()>;

    /// Adopt an existing token pair (used when reconciling a persisted
    /// session after the provider becomes ready).
    async fn set_session(&self, access_token: &str, refresh_token: &str) -> AuthResult<()>;

    /// Update attributes of the signed-in user.
    async fn update_user_attributes(
        &self,
        access_token: &str,
        attributes: serde_json::Value,
    ) -> AuthResult<()>;

    /// Generic authorized query against provider-hosted data; backs the
    /// organization-membership and permission checks.
    async fn query_rows(
        &self,
        table: &str,
        query: &str,
        access_token: &str,
    ) -> AuthResult<Vec<serde_json::Value>>;

    /// Drop any adopted session and return to the anonymous state.
    async fn reset(&self) -> AuthResult<()>;
}
