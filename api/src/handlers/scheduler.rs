use axum::{extract::State, Json};

use crate::handlers::SuccessResponse;
use crate::state::AppState;
use common::models::ScheduledJob;

/// Live timers ordered by next fire time
#[tracing::instrument(skip(state))]
pub async fn list_jobs(State(state): State<AppState>) -> Json<SuccessResponse<Vec<ScheduledJob>>> {
    let jobs = state.lifecycle.scheduled_jobs().await;
    tracing::debug!(count = jobs.len(), "Listed scheduled jobs");
    Json(SuccessResponse::new(jobs))
}
