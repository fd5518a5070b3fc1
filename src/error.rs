//! 错误处理模块
//!
//! 定义应用程序的错误类型和错误处理逻辑。
//!
//! 对外只暴露三类错误：`UNAUTHENTICATED`、`INVALID_ARGUMENT`、`INTERNAL`。
//! 存储层与事务层的细节在服务边界被折叠为 `Internal`，只写入日志。

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    /// 认证错误
    #[error("认证失败: {0}")]
    Authentication(String),

    /// 参数校验错误（携带字段名）
    #[error("参数无效 ({field}): {message}")]
    InvalidArgument { field: String, message: String },

    /// 数据库错误
    #[error("数据库错误: {0}")]
    Database(String),

    /// 连接错误
    #[error("连接错误: {0}")]
    Connection(String),

    /// 事务冲突重试耗尽
    #[error("事务冲突重试耗尽: {attempts} 次尝试")]
    TransactionExhausted { attempts: u32 },

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    Serialization(String),

    /// IO 错误
    #[error("IO 错误: {0}")]
    Io(String),

    /// 内部错误（对外可见的消息）
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    /// 构造参数错误
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::InvalidArgument {
            field: field.into(),
            message: message.into(),
        }
    }

    /// 在服务边界折叠错误
    ///
    /// 认证与参数错误原样返回；其余错误记录日志后统一转换为 `Internal(public_message)`。
    pub fn into_boundary(self, context: &str, public_message: &str) -> AppError {
        match self {
            AppError::Authentication(_) | AppError::InvalidArgument { .. } => self,
            other => {
                tracing::error!(context = context, error = %other, "request failed");
                AppError::Internal(public_message.to_string())
            }
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

impl From<figment::Error> for AppError {
    fn from(e: figment::Error) -> Self {
        AppError::Config(e.to_string())
    }
}

impl From<prometheus::Error> for AppError {
    fn from(e: prometheus::Error) -> Self {
        AppError::Config(format!("metrics registry: {}", e))
    }
}

#[cfg(feature = "surrealdb")]
impl From<surrealdb::Error> for AppError {
    fn from(e: surrealdb::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

/// Axum response implementation for AppError
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = (&self).into();
        let body = match &self {
            AppError::InvalidArgument { field, message } => {
                ErrorResponse::new(&code, message).with_field(field)
            }
            AppError::Authentication(message) | AppError::Internal(message) => {
                ErrorResponse::new(&code, message)
            }
            // 未经边界折叠的底层错误不向外泄露细节
            other => {
                tracing::error!(error = %other, "unmapped internal error reached response");
                ErrorResponse::new(&code, "internal error")
            }
        };
        (
            StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Json(body),
        )
            .into_response()
    }
}

/// 错误响应
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// 错误代码
    pub code: String,
    /// 错误消息
    pub message: String,
    /// 出错字段
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    /// 创建新错误响应
    pub fn new(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            field: None,
        }
    }

    /// 添加字段名
    pub fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }
}

/// HTTP 状态码映射
impl From<&AppError> for (u16, String) {
    fn from(err: &AppError) -> (u16, String) {
        match err {
            AppError::Authentication(_) => (401, "UNAUTHENTICATED".to_string()),
            AppError::InvalidArgument { .. } => (400, "INVALID_ARGUMENT".to_string()),
            _ => (500, "INTERNAL".to_string()),
        }
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;
