use axum::{
    Json,
    extract::{Extension, Query, State, rejection::QueryRejection},
    response::IntoResponse,
};
use tracing::debug;

use crate::{
    api::{app_state::AppState, dto::cohort_dto::*},
    error::AppError,
    security::auth::Claims,
};

pub async fn get_cohort_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    params: Result<Query<CohortStatsParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| AppError::invalid("query", e.body_text()))?;
    debug!(
        user_id = %claims.user_id(),
        age_group = ?params.age_group,
        occupation = ?params.occupation,
        "cohort stats requested"
    );

    let view = state
        .cohort_service
        .lookup(params.age_group.as_deref(), params.occupation.as_deref())
        .await?;

    Ok(Json(view))
}
