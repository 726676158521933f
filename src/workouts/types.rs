//! Workout Types
//!
//! Data model for the hosted `workouts` table and the client-side
//! aggregates the dashboard renders.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A logged workout row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workout {
    pub id: Uuid,
    /// Owner; rows are scoped to the signed-in user server-side
    pub user_id: Uuid,
    /// Sport label as entered ("Running", "Gym", "Yoga", ...)
    pub sport: String,
    /// Calendar day the workout happened
    pub performed_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_mins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Fields a client supplies when logging a workout
///
/// The owner and timestamps are filled in by the store and the backend.
#[derive(Debug, Clone, Serialize)]
pub struct NewWorkout {
    pub sport: String,
    pub performed_on: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_mins: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Aggregates for the dashboard's stat cards
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkoutStats {
    pub total_workouts: usize,
    pub total_distance_km: f64,
    pub total_calories: u64,
}

impl WorkoutStats {
    /// Aggregate a slice of workouts; absent measurements count as zero
    pub fn from_workouts(workouts: &[Workout]) -> Self {
        let mut stats = Self {
            total_workouts: workouts.len(),
            ..Self::default()
        };
        for workout in workouts {
            stats.total_distance_km += workout.distance_km.unwrap_or(0.0);
            stats.total_calories += u64::from(workout.calories.unwrap_or(0));
        }
        stats
    }
}
