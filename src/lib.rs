//! AthleteHub client core.
//!
//! Everything the front-end shells share: backend configuration, the
//! identity-service client, the session reconciliation controller, and the
//! thin data-access wrapper around the hosted `workouts` table. No UI
//! lives here.

// Declare modules
pub mod api;
pub mod config;
pub mod identity;
pub mod session;
pub mod workouts;

pub use api::{ApiError, ApiResult};
pub use config::BackendConfig;
pub use identity::{HttpIdentityService, IdentityService, Session, User};
pub use session::{SessionController, SessionState};
pub use workouts::{NewWorkout, Workout, WorkoutStats, WorkoutStore};
