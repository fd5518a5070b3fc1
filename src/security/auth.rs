//! Authentication Module
//!
//! Provides authentication mechanisms:
//! - API Key authentication (key mapped to a user id)
//! - JWT (JSON Web Token) authentication, `sub` carries the user id

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::config::config::SecurityConfig;
use crate::error::{AppError, Result};

/// API key 不过期，使用 i32 上限作为 exp
const NEVER_EXPIRES: usize = i32::MAX as usize;

/// Credentials for authentication
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    /// API key (if provided)
    pub api_key: Option<String>,
    /// JWT token (if provided)
    pub jwt_token: Option<String>,
}

impl Credentials {
    /// Create new credentials
    pub fn new(api_key: Option<String>, jwt_token: Option<String>) -> Self {
        Self { api_key, jwt_token }
    }

    /// Try to extract credentials from Authorization header
    pub fn from_authorization_header(auth_header: Option<&str>) -> Self {
        let Some(header) = auth_header.map(str::trim) else {
            return Self::default();
        };
        if let Some(key) = header.strip_prefix("ApiKey ") {
            Self::new(Some(key.trim().to_string()), None)
        } else if let Some(token) = header.strip_prefix("Bearer ") {
            Self::new(None, Some(token.trim().to_string()))
        } else {
            Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.api_key.is_none() && self.jwt_token.is_none()
    }
}

/// JWT Claims structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// Subject: the authenticated user id
    pub sub: String,
    /// Token expiration timestamp
    pub exp: usize,
    /// Token not before timestamp
    pub nbf: usize,
    /// Issued at timestamp
    pub iat: usize,
    /// Issuer
    pub iss: String,
    /// Audience
    pub aud: String,
    /// Unique token ID
    pub jti: String,
}

impl Claims {
    /// Create new claims
    pub fn new(sub: String, expiry_seconds: u64, issuer: String, audience: String) -> Self {
        let iat = Utc::now().timestamp() as usize;
        Self {
            sub,
            exp: iat + expiry_seconds as usize,
            nbf: iat,
            iat,
            iss: issuer,
            aud: audience,
            jti: Uuid::new_v4().to_string(),
        }
    }

    /// 认证后的用户 ID
    pub fn user_id(&self) -> &str {
        &self.sub
    }
}

/// Authentication trait for different authentication methods
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Authenticate credentials and return the caller's claims
    async fn authenticate(&self, credentials: &Credentials) -> Result<Claims>;
    /// Get the authenticator type
    fn authenticator_type(&self) -> &'static str;
}

/// API Key based authentication
#[derive(Debug, Clone)]
pub struct ApiKeyAuth {
    /// Valid API keys map (key -> user_id)
    valid_keys: HashMap<String, String>,
    issuer: String,
    audience: String,
}

impl ApiKeyAuth {
    /// Create new API key authenticator
    pub fn new(valid_keys: HashMap<String, String>, issuer: String, audience: String) -> Self {
        Self {
            valid_keys,
            issuer,
            audience,
        }
    }
}

#[async_trait]
impl Authenticator for ApiKeyAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Claims> {
        let api_key = credentials
            .api_key
            .as_ref()
            .ok_or_else(|| AppError::Authentication("No API key provided".to_string()))?;

        let user_id = self
            .valid_keys
            .get(api_key)
            .ok_or_else(|| AppError::Authentication("Invalid API key".to_string()))?;

        Ok(Claims {
            sub: user_id.clone(),
            exp: NEVER_EXPIRES,
            nbf: 0,
            iat: Utc::now().timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4().to_string(),
        })
    }

    fn authenticator_type(&self) -> &'static str {
        "ApiKey"
    }
}

/// JWT based authentication
#[derive(Clone)]
pub struct JwtAuth {
    /// Secret key for decoding
    decoding_key: DecodingKey,
    /// JWT issuer
    issuer: String,
    /// JWT audience
    audience: String,
}

impl JwtAuth {
    /// Create new JWT authenticator
    pub fn new(secret: &str, issuer: String, audience: String) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
        }
    }

    /// Validate a token and return its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.issuer.clone()]);
        validation.set_audience(&[self.audience.clone()]);
        validation.validate_nbf = true;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|e| AppError::Authentication(format!("Invalid JWT token: {}", e)))?;

        if claims.sub.trim().is_empty() {
            return Err(AppError::Authentication("JWT token has no subject".to_string()));
        }
        Ok(claims)
    }
}

#[async_trait]
impl Authenticator for JwtAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Claims> {
        let jwt_token = credentials
            .jwt_token
            .as_ref()
            .ok_or_else(|| AppError::Authentication("No JWT token provided".to_string()))?;
        self.validate_token(jwt_token)
    }

    fn authenticator_type(&self) -> &'static str {
        "JWT"
    }
}

/// Combined authenticator that tries multiple methods
#[derive(Clone, Default)]
pub struct CombinedAuthenticator {
    /// API key authenticator
    api_key_auth: Option<ApiKeyAuth>,
    /// JWT authenticator
    jwt_auth: Option<JwtAuth>,
}

impl CombinedAuthenticator {
    /// Create new combined authenticator
    pub fn new(api_key_auth: Option<ApiKeyAuth>, jwt_auth: Option<JwtAuth>) -> Self {
        Self {
            api_key_auth,
            jwt_auth,
        }
    }

    /// Create from security settings
    pub fn from_config(config: &SecurityConfig) -> Self {
        let api_key_auth = config.api_key_auth_enabled.then(|| {
            ApiKeyAuth::new(
                config.api_keys.clone(),
                config.jwt_issuer.clone(),
                config.jwt_audience.clone(),
            )
        });

        let jwt_auth = config.jwt_auth_enabled.then(|| {
            JwtAuth::new(
                &config.jwt_secret,
                config.jwt_issuer.clone(),
                config.jwt_audience.clone(),
            )
        });

        Self::new(api_key_auth, jwt_auth)
    }
}

#[async_trait]
impl Authenticator for CombinedAuthenticator {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Claims> {
        // Try API key first if available
        if let (Some(api_key_auth), Some(_)) = (&self.api_key_auth, &credentials.api_key) {
            return api_key_auth.authenticate(credentials).await;
        }

        if let (Some(jwt_auth), Some(_)) = (&self.jwt_auth, &credentials.jwt_token) {
            return jwt_auth.authenticate(credentials).await;
        }

        Err(AppError::Authentication(
            "No valid authentication method provided".to_string(),
        ))
    }

    fn authenticator_type(&self) -> &'static str {
        "Combined"
    }
}

/// JWT token generation helper
pub struct JwtTokenGenerator {
    encoding_key: EncodingKey,
    issuer: String,
    audience: String,
    expiry_seconds: u64,
}

impl JwtTokenGenerator {
    /// Create new token generator
    pub fn new(secret: &str, issuer: String, audience: String, expiry_seconds: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            expiry_seconds,
        }
    }

    /// Create a generator matching the configured JWT settings
    pub fn from_config(config: &SecurityConfig, expiry_seconds: u64) -> Self {
        Self::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.jwt_audience.clone(),
            expiry_seconds,
        )
    }

    /// Generate a new JWT token for a user
    pub fn generate_token(&self, user_id: &str) -> Result<String> {
        let claims = Claims::new(
            user_id.to_string(),
            self.expiry_seconds,
            self.issuer.clone(),
            self.audience.clone(),
        );

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::Authentication(format!("Failed to generate token: {}", e)))
    }
}
