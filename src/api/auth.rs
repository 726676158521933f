//! Request Authentication
//!
//! Header-application mechanisms for the hosted backend. Every request
//! carries the project's anon API key; user-scoped requests additionally
//! carry the session's bearer token.

use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

/// Trait for request authentication mechanisms
pub trait RequestAuth: Send + Sync {
    /// Apply authentication headers to a request
    fn apply(&self, request: RequestBuilder) -> RequestBuilder;

    /// Get auth type name for logging
    fn auth_type(&self) -> &'static str;
}

/// Anon API key authentication (`apikey` header)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyAuth {
    api_key: String,
}

impl ApiKeyAuth {
    /// Create a new anon-key authentication
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
        }
    }

    /// Get the key value
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

impl RequestAuth for ApiKeyAuth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("apikey", &self.api_key)
    }

    fn auth_type(&self) -> &'static str {
        "ApiKey"
    }
}

/// Bearer token authentication for user-scoped requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BearerAuth {
    token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl BearerAuth {
    /// Create a new bearer token authentication
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            expires_at: None,
        }
    }

    /// Create with expiration time
    pub fn with_expiry(token: impl Into<String>, expires_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        if let Some(expires_at) = self.expires_at {
            chrono::Utc::now() >= expires_at
        } else {
            false
        }
    }

    /// Get the token value
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl RequestAuth for BearerAuth {
    fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Bearer {}", self.token))
    }

    fn auth_type(&self) -> &'static str {
        "Bearer"
    }
}
