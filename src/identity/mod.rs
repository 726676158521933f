//! Identity Module
//!
//! Authentication against the hosted identity provider:
//! - Session and user data model
//! - The `IdentityService` seam the session controller consumes
//! - HTTP implementation for the hosted auth API

pub mod http;
pub mod service;
pub mod types;

pub use http::HttpIdentityService;
pub use service::{ChangeHandler, ChangeSubscription, IdentityService};
pub use types::{Credentials, Session, TokenResponse, User};
