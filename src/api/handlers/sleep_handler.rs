use axum::{
    Json,
    extract::{Extension, State, rejection::JsonRejection},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::sleep_dto::*},
    error::AppError,
    security::auth::Claims,
};

pub async fn upload_sleep_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    body: Result<Json<UploadSessionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(request) = body.map_err(|e| AppError::invalid("body", e.body_text()))?;
    debug!(user_id = %claims.user_id(), has_profile = request.user_profile.is_some(), "uploading sleep session");

    let receipt = state
        .upload_service
        .upload(
            claims.user_id(),
            &request.sleep_session,
            request.user_profile.as_ref(),
        )
        .await?;

    Ok(Json(UploadSessionResponse::from(receipt)))
}
