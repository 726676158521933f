//! Hosted Identity Service Client
//!
//! Client for the hosted auth API (GoTrue-compatible endpoints):
//! - Password sign-in and sign-up
//! - Sign-out
//! - Token refresh
//! - Session change notifications to registered handlers
//!
//! The current session is cached in memory only; durable persistence is
//! the embedding shell's concern, which can seed the cache at startup via
//! [`HttpIdentityService::restore_session`].

use async_trait::async_trait;
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::RwLock;
use reqwest::{Method, StatusCode};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::service::{ChangeHandler, ChangeSubscription, IdentityService};
use super::types::{Credentials, Session, TokenResponse};
use crate::api::{ApiError, ApiResult, RestClient};
use crate::config::BackendConfig;

/// Identity service backed by the hosted auth API
pub struct HttpIdentityService {
    /// Shared REST plumbing (anon key, timeouts, status mapping)
    rest: RestClient,
    /// In-memory session cache
    session: RwLock<Option<Session>>,
    /// Registered change handlers
    handlers: Arc<DashMap<u64, ChangeHandler>>,
    /// Handler id counter
    next_handler_id: AtomicU64,
}

impl HttpIdentityService {
    /// Create a new identity client
    pub fn new(config: &BackendConfig) -> ApiResult<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
            session: RwLock::new(None),
            handlers: Arc::new(DashMap::new()),
            next_handler_id: AtomicU64::new(1),
        })
    }

    /// Seed the session cache with a previously persisted session
    ///
    /// Does not emit a change event: a restored session is the state the
    /// process starts from, not a transition. The bootstrap fetch reports
    /// it to the controller.
    pub fn restore_session(&self, session: Session) {
        debug!("Restoring persisted session for user {}", session.user_id());
        *self.session.write() = Some(session);
    }

    /// Snapshot of the cached session
    pub fn current_session(&self) -> Option<Session> {
        self.session.read().clone()
    }

    /// Replace the cached session and notify subscribers
    fn set_session(&self, session: Option<Session>) {
        {
            *self.session.write() = session.clone();
        }
        self.emit_change(&session);
    }

    /// Dispatch a change event to every registered handler
    fn emit_change(&self, session: &Option<Session>) {
        // Clone the handlers out first so a handler that subscribes or
        // unsubscribes re-entrantly cannot deadlock against the registry.
        let handlers: Vec<ChangeHandler> = self.handlers.iter().map(|e| e.value().clone()).collect();
        debug!(
            "Dispatching session change to {} subscriber(s)",
            handlers.len()
        );
        for handler in handlers {
            handler(session.clone());
        }
    }

    /// Exchange a refresh token for a fresh session
    async fn refresh_session(&self, refresh_token: &str) -> ApiResult<Session> {
        let response = self
            .rest
            .request(Method::POST, "auth/v1/token?grant_type=refresh_token")?
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::SessionExpired);
        }

        let token: TokenResponse = RestClient::expect_json(response).await?;
        token.into_session().ok_or_else(|| {
            ApiError::InvalidResponse("refresh response carried no session".to_string())
        })
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn fetch_current_session(&self) -> ApiResult<Option<Session>> {
        let cached = self.current_session();
        let Some(session) = cached else {
            return Ok(None);
        };

        if !session.is_expired() {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.clone() else {
            warn!("Cached session expired with no refresh token; treating as signed out");
            self.set_session(None);
            return Ok(None);
        };

        match self.refresh_session(&refresh_token).await {
            Ok(fresh) => {
                info!("Session refreshed for user {}", fresh.user_id());
                self.set_session(Some(fresh.clone()));
                Ok(Some(fresh))
            }
            Err(e) => {
                warn!("Session refresh failed: {}", e);
                self.set_session(None);
                Err(e)
            }
        }
    }

    fn subscribe_changes(&self, handler: ChangeHandler) -> ChangeSubscription {
        let id = self.next_handler_id.fetch_add(1, Ordering::SeqCst);
        self.handlers.insert(id, handler);

        let handlers = Arc::clone(&self.handlers);
        ChangeSubscription::new(move || {
            handlers.remove(&id);
        })
    }

    async fn sign_in_with_password(&self, credentials: &Credentials) -> ApiResult<Session> {
        let response = self
            .rest
            .request(Method::POST, "auth/v1/token?grant_type=password")?
            .json(credentials)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::InvalidCredentials);
        }

        let token: TokenResponse = RestClient::expect_json(response).await?;
        let session = token.into_session().ok_or_else(|| {
            ApiError::InvalidResponse("token response carried no session".to_string())
        })?;

        info!("Signed in as user {}", session.user_id());
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_up(&self, credentials: &Credentials) -> ApiResult<Session> {
        let response = self
            .rest
            .request(Method::POST, "auth/v1/signup")?
            .json(credentials)
            .send()
            .await?;

        let token: TokenResponse = RestClient::expect_json(response).await?;
        let Some(session) = token.into_session() else {
            // Account exists but the provider wants the email confirmed
            // before issuing a token.
            return Err(ApiError::ConfirmationRequired);
        };

        info!("Signed up user {}", session.user_id());
        self.set_session(Some(session.clone()));
        Ok(session)
    }

    async fn sign_out(&self) -> ApiResult<()> {
        let token = match self.session.read().as_ref() {
            Some(session) => session.access_token.clone(),
            None => return Ok(()),
        };

        let response = self
            .rest
            .request_as_user(Method::POST, "auth/v1/logout", &token)?
            .send()
            .await?;

        match RestClient::check_status(response).await {
            Ok(_) => {}
            // A token the server no longer recognizes still means the user
            // is signed out; clear the local session either way.
            Err(ApiError::Unauthorized) | Err(ApiError::NotFound(_)) => {
                debug!("Logout rejected the token; clearing local session anyway");
            }
            Err(e) => return Err(e),
        }

        info!("Signed out");
        self.set_session(None);
        Ok(())
    }
}

impl std::fmt::Debug for HttpIdentityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpIdentityService")
            .field("signed_in", &self.session.read().is_some())
            .field("subscribers", &self.handlers.len())
            .finish()
    }
}
