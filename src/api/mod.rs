//! API 模块
//!
//! 提供 REST API 支持。

pub mod app_state;
pub mod dto;
pub mod handlers;
pub mod routes;

use crate::api::app_state::AppState;
use crate::observability::{ObservabilityState, create_observability_router, metrics_middleware};
use crate::security::middleware::auth_middleware;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method, header},
    middleware,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ]);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(allowed)
}

pub fn create_router(app_state: AppState, observability: Arc<ObservabilityState>) -> Router {
    let authenticated = Router::new()
        .merge(routes::sleep_routes::create_sleep_router())
        .merge(routes::cohort_routes::create_cohort_router())
        .route_layer(middleware::from_fn_with_state(
            app_state.authenticator.clone(),
            auth_middleware,
        ));

    let api = Router::new()
        .merge(authenticated)
        .merge(routes::trend_routes::create_trend_router());

    let timeout = Duration::from_secs(app_state.request_timeout_secs.max(1));
    let body_limit = app_state.max_request_size;
    let cors = cors_layer(&app_state.cors_allowed_origins);
    let metrics = app_state.metrics.clone();

    Router::new()
        .nest("/api/v1", api)
        .with_state(app_state)
        .merge(create_observability_router(observability))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TimeoutLayer::new(timeout))
        .layer(cors)
        .layer(middleware::from_fn_with_state(metrics, metrics_middleware))
        .layer(TraceLayer::new_for_http())
}
