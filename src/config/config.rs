use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// 存储后端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// 进程内存储（开发与测试）
    #[default]
    Memory,
    /// SurrealDB
    Surrealdb,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    /// 存储后端
    pub backend: StorageBackend,
    /// SurrealDB 连接地址
    pub url: String,
    /// 命名空间
    pub namespace: String,
    /// 数据库名称
    pub database: String,
    /// 用户名
    pub username: String,
    /// 密码
    pub password: String,
    /// 连接超时（秒）
    pub connection_timeout: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务地址
    pub host: String,
    /// 服务端口
    pub port: u16,
    /// 请求超时（秒）
    pub request_timeout: u64,
    /// 最大请求体大小（字节）
    pub max_request_size: usize,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SecurityConfig {
    /// 启用 API Key 认证
    pub api_key_auth_enabled: bool,
    /// API Key -> 用户 ID
    pub api_keys: HashMap<String, String>,
    /// 启用 JWT 认证
    pub jwt_auth_enabled: bool,
    /// JWT 密钥
    pub jwt_secret: String,
    /// JWT 签发者
    pub jwt_issuer: String,
    /// JWT 受众
    pub jwt_audience: String,
    /// CORS 允许的来源（为空表示允许任意来源）
    pub cors_allowed_origins: Vec<String>,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别
    pub level: String,
    /// 结构化（JSON）日志格式
    pub structured: bool,
    /// 日志文件目录，为空时只输出到控制台
    pub log_dir: Option<PathBuf>,
    /// 日志文件前缀
    pub file_prefix: String,
    /// 轮转策略: "hourly" | "daily" | "never"
    pub rotation: String,
}

/// 事务重试配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// 单次上传的最大提交尝试次数（含首次）
    pub max_attempts: u32,
    /// 首次冲突后的退避时间（毫秒）
    pub initial_backoff_ms: u64,
    /// 退避时间上限（毫秒）
    pub max_backoff_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff_ms: 10,
            max_backoff_ms: 200,
        }
    }
}

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// 数据库配置
    pub database: DatabaseConfig,
    /// 服务器配置
    pub server: ServerConfig,
    /// 安全配置
    pub security: SecurityConfig,
    /// 日志配置
    pub logging: LoggingConfig,
    /// 事务配置
    pub transaction: TransactionConfig,
    /// 应用名称
    pub app_name: String,
    /// 环境
    pub environment: String,
}

impl AppConfig {
    /// 创建开发环境配置
    pub fn development() -> Self {
        let mut api_keys = HashMap::new();
        api_keys.insert("dev-api-key".to_string(), "dev-user".to_string());

        Self {
            database: DatabaseConfig {
                backend: StorageBackend::Memory,
                url: "ws://localhost:8000".into(),
                namespace: "hypnos".into(),
                database: "sleep".into(),
                username: "root".into(),
                password: "root".into(),
                connection_timeout: 30,
            },
            server: ServerConfig {
                host: "0.0.0.0".into(),
                port: 8080,
                request_timeout: 30,
                max_request_size: 1024 * 1024,
            },
            security: SecurityConfig {
                api_key_auth_enabled: true,
                api_keys,
                jwt_auth_enabled: true,
                jwt_secret: "dev-secret-change-in-production-min-32-chars".into(),
                jwt_issuer: "hypnos".into(),
                jwt_audience: "hypnos-api".into(),
                cors_allowed_origins: Vec::new(),
            },
            logging: LoggingConfig {
                level: "debug".into(),
                structured: false,
                log_dir: None,
                file_prefix: "hypnos".into(),
                rotation: "daily".into(),
            },
            transaction: TransactionConfig::default(),
            app_name: "hypnos".into(),
            environment: "development".into(),
        }
    }

    /// 创建生产环境配置
    pub fn production() -> Self {
        let mut config = Self::development();
        config.environment = "production".into();
        config.database.backend = StorageBackend::Surrealdb;
        config.logging.level = "info".into();
        config.logging.structured = true;
        config.logging.log_dir = Some(PathBuf::from("./logs"));
        config.security.api_key_auth_enabled = false;
        config.security.api_keys.clear();
        config.transaction.max_attempts = 10;
        config
    }
}
