use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::models::ReminderDefinition;
use common::validation::CreateReminderRequest;

/// Create a reminder and schedule it when active.
///
/// Invalid input is rejected before anything is persisted or scheduled.
#[tracing::instrument(skip(state, payload))]
pub async fn create_reminder(
    State(state): State<AppState>,
    payload: Result<Json<CreateReminderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SuccessResponse<ReminderDefinition>>), ErrorResponse> {
    let Json(req) =
        payload.map_err(|e| ErrorResponse::new("validation_error", e.body_text()))?;

    let new_reminder = req.validate()?;
    let created = state.lifecycle.create(new_reminder).await?;

    tracing::info!(
        reminder_id = %created.id,
        recurrence = %created.recurrence,
        active = created.active,
        "Reminder created"
    );
    Ok((StatusCode::CREATED, Json(SuccessResponse::new(created))))
}

/// Mark a reminder active and schedule it
#[tracing::instrument(skip(state))]
pub async fn activate_reminder(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SuccessResponse<ReminderDefinition>>, ErrorResponse> {
    let id = reminder_id(id)?;
    let reminder = state.lifecycle.activate(id).await?;

    tracing::info!(reminder_id = %id, "Reminder activated");
    Ok(Json(SuccessResponse::new(reminder)))
}

/// Mark a reminder inactive and stop its timer
#[tracing::instrument(skip(state))]
pub async fn deactivate_reminder(
    State(state): State<AppState>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<SuccessResponse<ReminderDefinition>>, ErrorResponse> {
    let id = reminder_id(id)?;
    let reminder = state.lifecycle.deactivate(id).await?;

    tracing::info!(reminder_id = %id, "Reminder deactivated");
    Ok(Json(SuccessResponse::new(reminder)))
}

fn reminder_id(id: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, ErrorResponse> {
    let Path(id) = id.map_err(|e| {
        ErrorResponse::new("validation_error", e.body_text())
            .with_details(serde_json::json!({ "field": "id" }))
    })?;
    Ok(id)
}
