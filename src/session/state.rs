//! Session Controller State
//!
//! The controller's internal phase machine and the snapshot consumers see.

use serde::{Deserialize, Serialize};

use crate::identity::{Session, User};

/// Phase of the session controller
///
/// Moves strictly forward: `Uninitialized` until `initialize` is called,
/// `AwaitingFirstSignal` until either the bootstrap fetch or the change
/// stream produces an authoritative answer, then `Ready` forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerPhase {
    /// `initialize` has not been called yet
    Uninitialized,
    /// Bootstrap fetch and change stream are live; neither has spoken
    AwaitingFirstSignal,
    /// At least one authoritative signal has arrived
    Ready,
}

impl Default for ControllerPhase {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl std::fmt::Display for ControllerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::AwaitingFirstSignal => write!(f, "awaiting-first-signal"),
            Self::Ready => write!(f, "ready"),
        }
    }
}

impl ControllerPhase {
    /// Check if the controller has produced an authoritative answer
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Consumer-visible snapshot of the controller
///
/// Until `ready` is true, `session == None` means "not yet known", not
/// "definitely signed out"; consumers must not redirect on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    /// The latest known session, or `None` if no user is authenticated
    pub session: Option<Session>,
    /// True once the controller has resolved at least one authoritative
    /// signal; never reverts to false
    pub ready: bool,
}

impl SessionState {
    /// Check if a user is known to be signed in
    pub fn is_authenticated(&self) -> bool {
        self.ready && self.session.is_some()
    }

    /// Check if the user is known to be signed out
    pub fn is_anonymous(&self) -> bool {
        self.ready && self.session.is_none()
    }

    /// The signed-in user, when known
    pub fn user(&self) -> Option<&User> {
        self.session.as_ref().map(|s| &s.user)
    }
}
