//! Workouts Module
//!
//! The non-auth half of the app: logging workouts and reading them back
//! for the dashboard, against the hosted `workouts` table.

pub mod store;
pub mod types;

pub use store::WorkoutStore;
pub use types::{NewWorkout, Workout, WorkoutStats};
