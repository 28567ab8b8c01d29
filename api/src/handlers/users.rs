use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::handlers::{ErrorResponse, SuccessResponse};
use crate::state::AppState;
use common::models::User;
use common::validation::RegisterUserRequest;

/// Find or register the owner behind a chat address
#[tracing::instrument(skip(state, payload))]
pub async fn register_user(
    State(state): State<AppState>,
    payload: Result<Json<RegisterUserRequest>, JsonRejection>,
) -> Result<Json<SuccessResponse<User>>, ErrorResponse> {
    let Json(req) =
        payload.map_err(|e| ErrorResponse::new("validation_error", e.body_text()))?;

    let owner = req.validate()?;
    let user = state
        .owners
        .register(&owner.chat_id, owner.name.as_deref())
        .await?;

    tracing::info!(user_id = %user.id, "Owner resolved");
    Ok(Json(SuccessResponse::new(user)))
}
