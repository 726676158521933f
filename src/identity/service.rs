//! Identity Service Boundary
//!
//! The seam between this crate and whatever provides authentication. The
//! session controller only ever talks to this trait, so tests drive it
//! with in-process fakes and production wires up the HTTP client.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use super::types::{Credentials, Session};
use crate::api::ApiResult;

/// Handler invoked for every session change pushed by the identity service
///
/// The payload is the new session, or `None` on sign-out.
pub type ChangeHandler = Arc<dyn Fn(Option<Session>) + Send + Sync>;

/// Trait for identity providers
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// One-shot bootstrap fetch of the current session
    ///
    /// May fail; callers decide how a failed bootstrap degrades.
    async fn fetch_current_session(&self) -> ApiResult<Option<Session>>;

    /// Register a handler for future session changes
    ///
    /// Delivers zero or more events for the lifetime of the subscription,
    /// starting at an unspecified time relative to the bootstrap fetch.
    /// The stream never completes on its own; it stops when the returned
    /// handle is unsubscribed.
    fn subscribe_changes(&self, handler: ChangeHandler) -> ChangeSubscription;

    /// Sign in with email and password
    async fn sign_in_with_password(&self, credentials: &Credentials) -> ApiResult<Session>;

    /// Create an account; returns the new session when the provider signs
    /// the user in immediately
    async fn sign_up(&self, credentials: &Credentials) -> ApiResult<Session>;

    /// Sign out the current session
    async fn sign_out(&self) -> ApiResult<()>;
}

/// Handle that releases a change-stream subscription
pub struct ChangeSubscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ChangeSubscription {
    /// Wrap a cancellation action
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Release the subscription; no-op after the first call
    pub fn unsubscribe(&self) {
        if let Some(cancel) = self.cancel.lock().take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for ChangeSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeSubscription")
            .field("released", &self.cancel.lock().is_none())
            .finish()
    }
}
