//! Routes 模块
//!
//! 定义 API 路由。

pub mod cohort_routes;
pub mod sleep_routes;
pub mod trend_routes;
