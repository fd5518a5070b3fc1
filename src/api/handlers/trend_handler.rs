use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    response::IntoResponse,
};

use crate::{
    api::{app_state::AppState, dto::trend_dto::*},
    error::AppError,
};

pub async fn get_trends(
    State(state): State<AppState>,
    params: Result<Query<TrendParams>, QueryRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Query(params) = params.map_err(|e| AppError::invalid("query", e.body_text()))?;
    let report = state.trend_service.trends(params.period()).await?;
    Ok(Json(report))
}
