//! Workout Store
//!
//! Thin data-access wrapper around the hosted `workouts` table. Queries go
//! through the backend's REST surface with the signed-in user's bearer
//! token; row visibility is enforced server-side.

use log::debug;
use reqwest::Method;
use serde::Serialize;
use uuid::Uuid;

use super::types::{NewWorkout, Workout, WorkoutStats};
use crate::api::{ApiError, ApiResult, RestClient};
use crate::config::BackendConfig;
use crate::identity::Session;

/// Insert body: the client-supplied fields plus the owning user
#[derive(Serialize)]
struct InsertPayload<'a> {
    user_id: Uuid,
    #[serde(flatten)]
    workout: &'a NewWorkout,
}

/// Client for the `workouts` table
#[derive(Debug, Clone)]
pub struct WorkoutStore {
    rest: RestClient,
}

impl WorkoutStore {
    /// Create a new workout store
    pub fn new(config: &BackendConfig) -> ApiResult<Self> {
        Ok(Self {
            rest: RestClient::new(config)?,
        })
    }

    /// List the signed-in user's workouts, newest first
    pub async fn list_for_user(&self, session: &Session) -> ApiResult<Vec<Workout>> {
        let path = Self::list_path(session.user_id());
        debug!("Fetching workouts for user {}", session.user_id());

        let response = self
            .rest
            .request_as_user(Method::GET, &path, &session.access_token)?
            .send()
            .await?;

        RestClient::expect_json(response).await
    }

    /// Log a new workout for the signed-in user
    pub async fn insert(&self, session: &Session, workout: &NewWorkout) -> ApiResult<Workout> {
        let payload = InsertPayload {
            user_id: session.user_id(),
            workout,
        };

        let response = self
            .rest
            .request_as_user(Method::POST, "rest/v1/workouts", &session.access_token)?
            .header("Prefer", "return=representation")
            .json(&payload)
            .send()
            .await?;

        // The backend answers an insert with the array of created rows.
        let rows: Vec<Workout> = RestClient::expect_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| ApiError::InvalidResponse("insert returned no rows".to_string()))
    }

    /// Dashboard aggregates for the signed-in user
    pub async fn stats_for_user(&self, session: &Session) -> ApiResult<WorkoutStats> {
        let workouts = self.list_for_user(session).await?;
        Ok(WorkoutStats::from_workouts(&workouts))
    }

    fn list_path(user_id: Uuid) -> String {
        format!(
            "rest/v1/workouts?user_id=eq.{}&select=*&order=performed_on.desc",
            user_id
        )
    }
}
