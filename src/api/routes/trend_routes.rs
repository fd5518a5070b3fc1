//! Trend Routes

use axum::{Router, routing::get};

use crate::api::app_state::AppState;
use crate::api::handlers::trend_handler::*;

/// 创建趋势路由器（公开）
pub fn create_trend_router() -> Router<AppState> {
    Router::new().route("/trends", get(get_trends))
}
