//! Session Module
//!
//! The crate's core: a race-free reconciliation of the identity service's
//! bootstrap fetch and change stream into one monotonically-resolving
//! `(session, ready)` answer, with synchronous consumer notifications.

pub mod controller;
pub mod state;

pub use controller::{SessionController, StateHandler, StateSubscription};
pub use state::{ControllerPhase, SessionState};
