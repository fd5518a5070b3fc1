//! Security Middleware Module
//!
//! 认证中间件：在处理函数之前解析凭证，成功后把 [`Claims`] 放进请求扩展。

use axum::{
    body::Body,
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::security::auth::{Authenticator, Claims, Credentials};

/// Extension trait for adding claims to request extensions
pub trait RequestClaimsExt {
    fn claims(&self) -> Option<&Claims>;
    fn set_claims(&mut self, claims: Claims);
}

impl RequestClaimsExt for Request<Body> {
    fn claims(&self) -> Option<&Claims> {
        self.extensions().get::<Claims>()
    }

    fn set_claims(&mut self, claims: Claims) {
        self.extensions_mut().insert(claims);
    }
}

/// Authentication middleware
pub async fn auth_middleware(
    State(authenticator): State<Arc<dyn Authenticator>>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let credentials = extract_credentials(&req);

    match authenticator.authenticate(&credentials).await {
        Ok(claims) => {
            tracing::debug!(user_id = %claims.user_id(), method = authenticator.authenticator_type(), "authenticated");
            req.set_claims(claims);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(error = %e, path = %req.uri().path(), "authentication rejected");
            e.into_response()
        }
    }
}

/// Extract credentials from request headers
fn extract_credentials(req: &Request<Body>) -> Credentials {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .map(|h| Credentials::from_authorization_header(Some(h)))
        .unwrap_or_default();
    if !from_header.is_empty() {
        return from_header;
    }

    if let Some(key) = req.headers().get("X-API-Key").and_then(|h| h.to_str().ok()) {
        return Credentials::new(Some(key.trim().to_string()), None);
    }

    Credentials::default()
}
