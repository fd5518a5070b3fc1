//! Sleep Session Routes

use axum::{Router, routing::post};

use crate::api::app_state::AppState;
use crate::api::handlers::sleep_handler::*;

/// 创建睡眠会话路由器（需认证）
pub fn create_sleep_router() -> Router<AppState> {
    Router::new().route("/sleep-sessions", post(upload_sleep_session))
}
