//! Session model: the token pair plus user identity, and its persisted form.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Provider claims (user metadata), opaque to the lifecycle core.
    #[serde(default)]
    pub claims: serde_json::Value,
}

/// An authenticated session as returned by the identity provider.
///
/// Serializes with the camelCase field names of the persisted wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    #[serde(rename = "expiresIn")]
    pub expires_in_seconds: i64,
    #[serde(rename = "createdAt")]
    pub created_at_utc: DateTime<Utc>,
    pub user: SessionUser,
}

impl Session {
    /// A session is usable only with a non-empty access token.
    pub fn is_usable(&self) -> bool {
        !self.access_token.is_empty()
    }

    /// Expiry recomputed from creation time; `None` when the provider gave
    /// no positive lifetime.
    pub fn computed_expiry_utc(&self) -> Option<DateTime<Utc>> {
        if self.expires_in_seconds > 0 {
            Some(self.created_at_utc + Duration::seconds(self.expires_in_seconds))
        } else {
            None
        }
    }
}

/// The persisted form of a session: the session itself plus the flags and
/// timestamps written at save time.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub session: Session,
    /// Authoritative over recomputation from `created_at + expires_in`.
    pub absolute_expiry_utc: Option<DateTime<Utc>>,
    pub is_persistent: bool,
    pub is_new_user: bool,
    pub last_refresh_utc: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn session_with_token(access_token: &str) -> Session {
        Session {
            access_token: access_token.to_string(),
            refresh_token: "refresh-1".to_string(),
            token_type: "bearer".to_string(),
            expires_in_seconds: 3600,
            created_at_utc: Utc::now(),
            user: SessionUser {
                id: "user-1".to_string(),
                phone: Some("+15551230000".to_string()),
                email: None,
                claims: serde_json::Value::Null,
            },
        }
    }

    #[test]
    fn test_usable_requires_access_token() {
        assert!(session_with_token("token").is_usable());
        assert!(!session_with_token("").is_usable());
    }

    #[test]
    fn test_computed_expiry() {
        let session = session_with_token("token");
        let expiry = session.computed_expiry_utc().unwrap();
        assert_eq!(expiry, session.created_at_utc + Duration::seconds(3600));

        let mut no_lifetime = session;
        no_lifetime.expires_in_seconds = 0;
        assert_eq!(no_lifetime.computed_expiry_utc(), None);
    }

    #[test]
    fn test_wire_format_field_names() {
        let session = session_with_token("token");
        let json = serde_json::to_string(&session).unwrap();
        for field in [
            "accessToken",
            "refreshToken",
            "tokenType",
            "expiresIn",
            "createdAt",
        ] {
            assert!(json.contains(field), "missing field {field}: {json}");
        }

        let parsed: Session = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, session);
    }
}
