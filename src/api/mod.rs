//! Hosted Backend API Module
//!
//! Shared REST plumbing for the identity and data-access clients:
//! - HTTP client construction with configured timeouts
//! - Base-URL path joining
//! - Anon-key / bearer-token header application
//! - Uniform HTTP status to error mapping

pub mod auth;
pub mod error;

pub use auth::{ApiKeyAuth, BearerAuth, RequestAuth};
pub use error::{ApiError, ApiResult};

use log::debug;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::BackendConfig;

/// Low-level client for the hosted backend's REST surface
#[derive(Debug, Clone)]
pub struct RestClient {
    /// HTTP client with configured timeouts
    client: Client,
    /// Backend base URL (trailing slash guaranteed by config)
    base_url: Url,
    /// Project anon key, applied to every request
    anon: ApiKeyAuth,
}

impl RestClient {
    /// Create a new REST client from backend configuration
    pub fn new(config: &BackendConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| ApiError::TransportError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            anon: ApiKeyAuth::new(&config.anon_key),
        })
    }

    /// Resolve a backend path against the base URL
    pub fn endpoint(&self, path: &str) -> ApiResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Build a request authenticated with the anon key only
    ///
    /// Used outside any user session (sign-in, sign-up). The anon key also
    /// rides along as the bearer token, which is what the hosted backend
    /// expects from unauthenticated clients.
    pub fn request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let request = self.bare_request(method, path)?;
        Ok(BearerAuth::new(self.anon.api_key()).apply(request))
    }

    /// Build a request authenticated as a signed-in user
    pub fn request_as_user(
        &self,
        method: Method,
        path: &str,
        access_token: &str,
    ) -> ApiResult<RequestBuilder> {
        let request = self.bare_request(method, path)?;
        Ok(BearerAuth::new(access_token).apply(request))
    }

    fn bare_request(&self, method: Method, path: &str) -> ApiResult<RequestBuilder> {
        let url = self.endpoint(path)?;
        debug!("Building {} request for {}", method, url);

        let request = self
            .client
            .request(method, url)
            .header("Content-Type", "application/json");

        Ok(self.anon.apply(request))
    }

    /// Check the response status and deserialize the JSON body
    pub async fn expect_json<T: DeserializeOwned>(response: Response) -> ApiResult<T> {
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// Map non-success HTTP statuses to the error taxonomy
    pub async fn check_status(response: Response) -> ApiResult<Response> {
        let status = response.status();
        match status {
            s if s.is_success() => Ok(response),
            StatusCode::UNAUTHORIZED => Err(ApiError::Unauthorized),
            StatusCode::NOT_FOUND => {
                Err(ApiError::NotFound(response.url().path().to_string()))
            }
            s if s.is_server_error() => {
                let error_text = response.text().await.unwrap_or_default();
                Err(ApiError::ServerError(format!("HTTP {}: {}", s, error_text)))
            }
            s => {
                let error_text = response.text().await.unwrap_or_default();
                Err(ApiError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    s, error_text
                )))
            }
        }
    }
}
