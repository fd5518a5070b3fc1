//! 可观测性模块
//!
//! 提供 Prometheus 指标、结构化日志和健康检查。

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::AppMetrics;

use axum::{
    Json, Router,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

use crate::storage::store::SleepStore;

// ===== Health Check =====

/// 健康检查状态
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: Vec<HealthCheck>,
}

/// 单个健康检查项
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub name: String,
    pub status: String,
    pub message: Option<String>,
    pub latency_ms: Option<u64>,
}

/// 可观测性状态
#[derive(Clone)]
pub struct ObservabilityState {
    pub metrics: Arc<AppMetrics>,
    pub store: Arc<dyn SleepStore>,
    pub start_time: DateTime<Utc>,
    pub version: String,
}

impl ObservabilityState {
    pub fn new(metrics: Arc<AppMetrics>, store: Arc<dyn SleepStore>, version: String) -> Self {
        Self {
            metrics,
            store,
            start_time: Utc::now(),
            version,
        }
    }

    /// 获取应用正常运行时间
    pub fn uptime_seconds(&self) -> f64 {
        (Utc::now() - self.start_time).num_milliseconds() as f64 / 1000.0
    }

    /// 检查存储
    async fn check_storage(&self) -> HealthCheck {
        let start = Instant::now();
        let result = self.store.health_check().await;
        let latency_ms = Some(start.elapsed().as_millis() as u64);
        match result {
            Ok(()) => HealthCheck {
                name: "storage".to_string(),
                status: "healthy".to_string(),
                message: None,
                latency_ms,
            },
            Err(e) => {
                tracing::warn!(error = %e, "storage health check failed");
                HealthCheck {
                    name: "storage".to_string(),
                    status: "unhealthy".to_string(),
                    message: Some("storage unavailable".to_string()),
                    latency_ms,
                }
            }
        }
    }
}

// ===== Health Check Handlers =====

/// 获取完整健康状态
pub async fn health_check(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    let checks = vec![state.check_storage().await];
    let all_healthy = checks.iter().all(|c| c.status == "healthy");

    let health_status = HealthStatus {
        status: if all_healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        version: state.version.clone(),
        uptime_seconds: state.uptime_seconds(),
        checks,
    };

    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(health_status))
}

/// 简单存活检查
pub async fn liveness() -> impl IntoResponse {
    "OK"
}

/// 就绪检查（检查存储）
pub async fn readiness(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    match state.store.health_check().await {
        Ok(()) => (StatusCode::OK, "Ready"),
        Err(_) => (StatusCode::SERVICE_UNAVAILABLE, "Not Ready"),
    }
}

/// Prometheus 指标端点
pub async fn metrics(State(state): State<Arc<ObservabilityState>>) -> Response {
    match state.metrics.gather() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4")],
            output,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// 版本信息端点
pub async fn version(State(state): State<Arc<ObservabilityState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "version": state.version,
        "uptime_seconds": state.uptime_seconds(),
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// 创建可观测性路由
pub fn create_observability_router(state: Arc<ObservabilityState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/metrics", get(metrics))
        .route("/version", get(version))
        .with_state(state)
}

// ===== Request Metrics Middleware =====

/// 记录请求指标的中间件
pub async fn metrics_middleware(
    State(metrics): State<Arc<AppMetrics>>,
    req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();

    let response = next.run(req).await;

    metrics.record_http_request(
        &method,
        response.status().as_u16(),
        start.elapsed().as_secs_f64(),
    );
    response
}
