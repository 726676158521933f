//! Backend Configuration
//!
//! Connection settings for the hosted backend (auth + data API share one
//! project URL and one anon key). Read from the environment in deployed
//! builds, constructed explicitly in tests.

use log::debug;
use url::Url;

use crate::api::{ApiError, ApiResult};

/// Environment variable holding the project URL
pub const ENV_API_URL: &str = "ATHLETEHUB_API_URL";
/// Environment variable holding the project anon key
pub const ENV_ANON_KEY: &str = "ATHLETEHUB_ANON_KEY";

/// Default request timeout in milliseconds
const DEFAULT_TIMEOUT_MS: u64 = 30000;

/// Connection configuration for the hosted backend
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Project base URL, normalized to end with a slash
    pub url: Url,
    /// Project anon key
    pub anon_key: String,
    /// Request timeout in milliseconds
    pub timeout_ms: u64,
}

impl BackendConfig {
    /// Create a configuration from explicit values
    pub fn new(url: impl AsRef<str>, anon_key: impl Into<String>) -> ApiResult<Self> {
        let mut url = Url::parse(url.as_ref())?;
        let anon_key = anon_key.into();

        if anon_key.trim().is_empty() {
            return Err(ApiError::InvalidConfig("anon key is empty".to_string()));
        }
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidConfig(format!(
                "unsupported URL scheme: {}",
                url.scheme()
            )));
        }

        // Guarantee a trailing slash so Url::join keeps the full base path.
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }

        Ok(Self {
            url,
            anon_key,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        })
    }

    /// Read the configuration from the environment
    ///
    /// Fails with `InvalidConfig` when either variable is missing, so a
    /// misconfigured deployment surfaces at startup instead of as opaque
    /// request failures.
    pub fn from_env() -> ApiResult<Self> {
        let url = std::env::var(ENV_API_URL)
            .map_err(|_| ApiError::InvalidConfig(format!("{} is not set", ENV_API_URL)))?;
        let anon_key = std::env::var(ENV_ANON_KEY)
            .map_err(|_| ApiError::InvalidConfig(format!("{} is not set", ENV_ANON_KEY)))?;

        debug!("Backend configuration loaded from environment");
        Self::new(url, anon_key)
    }

    /// Override the request timeout
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}
