//! Cohort Routes

use axum::{Router, routing::get};

use crate::api::app_state::AppState;
use crate::api::handlers::cohort_handler::*;

/// 创建人群统计路由器（需认证）
pub fn create_cohort_router() -> Router<AppState> {
    Router::new().route("/cohorts/stats", get(get_cohort_stats))
}
