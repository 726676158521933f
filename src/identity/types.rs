//! Identity Types
//!
//! Session and user data model for the hosted auth service, plus the wire
//! shapes its token endpoints return.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authenticated user as reported by the auth service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Free-form profile metadata (display name lives here)
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    /// Display name with the dashboard's fallback chain:
    /// profile full name, then the local part of the email, then "Athlete".
    pub fn display_name(&self) -> String {
        if let Some(name) = self.user_metadata.get("full_name").and_then(|v| v.as_str()) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
        if let Some(email) = &self.email {
            if let Some(local) = email.split('@').next() {
                if !local.is_empty() {
                    return local.to_string();
                }
            }
        }
        "Athlete".to_string()
    }
}

/// An authenticated session
///
/// Opaque to the session controller beyond presence/absence; the embedded
/// user is a pass-through field for consumers. Compares by value so
/// no-op change notifications are cheaply detectable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Access token sent as the bearer credential on user-scoped requests
    pub access_token: String,
    /// Token type, "bearer" in practice
    pub token_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// The signed-in user
    pub user: User,
}

impl Session {
    /// Check if the access token is past its expiry
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            Utc::now() >= expires_at
        } else {
            false
        }
    }

    /// The signed-in user's id
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }
}

/// Email/password credentials for sign-in and sign-up
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Wire shape of the auth service's token and signup endpoints
///
/// Signup responses may omit the token fields entirely when email
/// confirmation is still pending.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    /// Token lifetime in seconds
    pub expires_in: Option<i64>,
    /// Absolute expiry as a unix timestamp, when the server provides one
    pub expires_at: Option<i64>,
    pub refresh_token: Option<String>,
    pub user: Option<User>,
}

impl TokenResponse {
    /// Convert the wire response into a session
    ///
    /// Returns `None` when the response carries no usable token (email
    /// confirmation pending).
    pub fn into_session(self) -> Option<Session> {
        let access_token = self.access_token?;
        let user = self.user?;

        let expires_at = self
            .expires_at
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| {
                self.expires_in
                    .map(|secs| Utc::now() + chrono::Duration::seconds(secs))
            });

        Some(Session {
            access_token,
            token_type: self.token_type.unwrap_or_else(|| "bearer".to_string()),
            refresh_token: self.refresh_token,
            expires_at,
            user,
        })
    }
}
