//! Supabase REST client for authentication and authorized data queries.
//!
//! Speaks the GoTrue auth dialect (`/auth/v1/...`) plus the PostgREST data
//! surface (`/rest/v1/...`) used for authorization checks.

use crate::provider::IdentityProviderClient;
use crate::session::{Session, SessionUser};
use crate::{AuthError, AuthResult};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;
use tracing::{debug, warn};

/// Provider-side request deadline.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn summarize_response_body(body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("len={},digest={:016x}", body.len(), hasher.finish())
}

/// Token grant response from the auth endpoint.
///
/// Every field is defaulted: a sign-up that still awaits email confirmation
/// answers with a bare user object and no tokens, which must read as "no
/// usable session" rather than a parse failure.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default)]
    token_type: String,
    #[serde(default)]
    expires_in: i64,
    #[serde(default)]
    user: Option<UserPayload>,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

impl TokenResponse {
    fn into_session(self) -> Option<Session> {
        let user = self.user?;
        let session = Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            expires_in_seconds: self.expires_in,
            created_at_utc: Utc::now(),
            user: SessionUser {
                id: user.id,
                // GoTrue reports a missing phone as an empty string.
                phone: user.phone.filter(|p| !p.is_empty()),
                email: user.email.filter(|e| !e.is_empty()),
                claims: user.user_metadata,
            },
        };
        session.is_usable().then_some(session)
    }
}

/// Supabase-backed identity provider client.
#[derive(Clone)]
pub struct SupabaseIdentityClient {
    http_client: reqwest::Client,
    api_url: String,
    publishable_key: String,
}

impl SupabaseIdentityClient {
    /// Create a client for a Supabase project.
    ///
    /// # Arguments
    /// * `api_url` - The project API URL (e.g., `https://xyz.supabase.co`)
    /// * `publishable_key` - The anonymous/publishable API key
    pub fn new(
        api_url: impl Into<String>,
        publishable_key: impl Into<String>,
    ) -> AuthResult<Self> {
        let api_url = api_url.into();
        url::Url::parse(&api_url)?;

        let http_client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            api_url: api_url.trim_end_matches('/').to_string(),
            publishable_key: publishable_key.into(),
        })
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    fn rest_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_url, table)
    }

    /// POST a JSON body to an auth endpoint and parse a token grant.
    async fn token_request(
        &self,
        url: &str,
        body: serde_json::Value,
        credential_failure: bool,
    ) -> AuthResult<Option<Session>> {
        debug!(url, "Auth token request");

        let response = self
            .http_client
            .post(url)
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "Auth request failed");

            if credential_failure && status.is_client_error() {
                return Err(AuthError::InvalidCredentials(format!(
                    "HTTP {} ({})",
                    status, body_summary
                )));
            }
            return Err(AuthError::Provider(format!(
                "HTTP {} ({})",
                status, body_summary
            )));
        }

        let grant: TokenResponse = response.json().await?;
        match grant.into_session() {
            Some(session) => Ok(Some(session)),
            None => {
                warn!("Provider response contained no usable session");
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl IdentityProviderClient for SupabaseIdentityClient {
    async fn sign_in_password(
        &self,
        email: &str,
        password: &str,
    ) -> AuthResult<Option<Session>> {
        self.token_request(
            &self.auth_url("token?grant_type=password"),
            serde_json::json!({ "email": email, "password": password }),
            true,
        )
        .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> AuthResult<Option<Session>> {
        self.token_request(
            &self.auth_url("signup"),
            serde_json::json!({ "email": email, "password": password }),
            true,
        )
        .await
    }

    async fn request_otp(&self, phone: &str) -> AuthResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("otp"))
            .header("apikey", &self.publishable_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "phone": phone, "create_user": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "OTP request failed");
            return Err(AuthError::Provider(format!(
                "OTP request failed: {} ({})",
                status, body_summary
            )));
        }

        Ok(())
    }

    async fn verify_otp(&self, phone: &str, code: &str) -> AuthResult<Option<Session>> {
        self.token_request(
            &self.auth_url("verify"),
            serde_json::json!({ "type": "sms", "phone": phone, "token": code }),
            true,
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<Option<Session>> {
        self.token_request(
            &self.auth_url("token?grant_type=refresh_token"),
            serde_json::json!({ "refresh_token": refresh_token }),
            false,
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .http_client
            .post(self.auth_url("logout"))
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "Sign-out failed");
            return Err(AuthError::Provider(format!(
                "Sign-out failed: {} ({})",
                status, body_summary
            )));
        }

        Ok(())
    }

    async fn set_session(&self, access_token: &str, _refresh_token: &str) -> AuthResult<()> {
        // Adopting a stored token pair amounts to proving the access token
        // is still honored server-side.
        let response = self
            .http_client
            .get(self.auth_url("user"))
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, "Stored session rejected by server");
            return Err(AuthError::SessionInvalid(format!(
                "Server rejected session: HTTP {} ({})",
                status,
                summarize_response_body(&body)
            )));
        }

        let user: UserPayload = response.json().await?;
        debug!(user_id = %user.id, "Stored session verified with server");
        Ok(())
    }

    async fn update_user_attributes(
        &self,
        access_token: &str,
        attributes: serde_json::Value,
    ) -> AuthResult<()> {
        let response = self
            .http_client
            .put(self.auth_url("user"))
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({ "data": attributes }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, "User attribute update failed");
            return Err(AuthError::Provider(format!(
                "User attribute update failed: {} ({})",
                status, body_summary
            )));
        }

        Ok(())
    }

    async fn query_rows(
        &self,
        table: &str,
        query: &str,
        access_token: &str,
    ) -> AuthResult<Vec<serde_json::Value>> {
        let url = format!("{}?{}", self.rest_url(table), query);
        debug!(table, "Authorized query");

        let response = self
            .http_client
            .get(&url)
            .header("apikey", &self.publishable_key)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body_summary = summarize_response_body(&body);
            warn!(status = %status, body_summary = %body_summary, table, "Query failed");
            return Err(AuthError::Provider(format!(
                "Query against {} failed: {} ({})",
                table, status, body_summary
            )));
        }

        let rows: Vec<serde_json::Value> = response.json().await?;
        debug!(table, rows = rows.len(), "Query returned");
        Ok(rows)
    }

    async fn reset(&self) -> AuthResult<()> {
        // The client keeps no adopted session state; anonymous is the
        // default posture.
        debug!("Provider client reset to anonymous");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation_normalizes_url() {
        let client =
            SupabaseIdentityClient::new("https://test.supabase.co/", "test-key").unwrap();
        assert_eq!(client.api_url, "https://test.supabase.co");
        assert_eq!(
            client.auth_url("token?grant_type=password"),
            "https://test.supabase.co/auth/v1/token?grant_type=password"
        );
        assert_eq!(
            client.rest_url("organization_members"),
            "https://test.supabase.co/rest/v1/organization_members"
        );
    }

    #[test]
    fn test_client_creation_rejects_bad_url() {
        assert!(SupabaseIdentityClient::new("not a url", "key").is_err());
    }

    #[test]
    fn test_token_response_into_session() {
        let json = serde_json::json!({
            "access_token": "access-1",
            "refresh_token": "refresh-1",
            "token_type": "bearer",
            "expires_in": 3600,
            "user": {
                "id": "user-1",
                "email": "till@example.com",
                "phone": "",
                "user_metadata": { "display_name": "Till" }
            }
        });
        let grant: TokenResponse = serde_json::from_value(json).unwrap();
        let session = grant.into_session().unwrap();

        assert!(session.is_usable());
        assert_eq!(session.user.id, "user-1");
        assert_eq!(session.user.phone, None);
        assert_eq!(
            session.user.claims["display_name"],
            serde_json::json!("Till")
        );
    }

    #[test]
    fn test_empty_access_token_is_unusable() {
        let json = serde_json::json!({
            "access_token": "",
            "user": { "id": "user-1" }
        });
        let grant: TokenResponse = serde_json::from_value(json).unwrap();
        assert!(grant.into_session().is_none());
    }

    #[test]
    fn test_confirmation_pending_signup_has_no_session() {
        // A bare user object (no tokens) is what signup returns while email
        // confirmation is pending.
        let json = serde_json::json!({
            "id": "user-1",
            "email": "till@example.com"
        });
        let grant: TokenResponse = serde_json::from_value(json).unwrap();
        assert!(grant.into_session().is_none());
    }

    #[test]
    fn test_body_summary_hides_content() {
        let summary = summarize_response_body("secret token material");
        assert!(summary.starts_with("len=21,digest="));
        assert!(!summary.contains("secret"));
    }
}
