//! Security Module
//!
//! Authentication for the Hypnos API:
//! - API Key + JWT authenticators
//! - Axum authentication middleware

pub mod auth;
pub mod middleware;

pub use auth::{
    ApiKeyAuth, Authenticator, Claims, CombinedAuthenticator, Credentials, JwtAuth,
    JwtTokenGenerator,
};
pub use middleware::auth_middleware;
