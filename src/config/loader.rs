use crate::config::config::{AppConfig, StorageBackend};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};

/// 配置加载器
pub struct ConfigLoader;

impl ConfigLoader {
    /// 从默认路径加载配置
    ///
    /// 合并顺序（后者覆盖前者）：
    /// 1. 开发环境默认值
    /// 2. ./hypnos.toml
    /// 3. `HYPNOS_` 前缀的环境变量，`__` 表示嵌套，例如 `HYPNOS_SERVER__PORT`
    pub fn load() -> Result<AppConfig, figment::Error> {
        Self::load_from(default_config_path())
    }

    /// 从指定路径加载配置
    pub fn load_from(path: impl AsRef<Path>) -> Result<AppConfig, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        let base = if std::env::var("HYPNOS_ENVIRONMENT").as_deref() == Ok("production") {
            AppConfig::production()
        } else {
            AppConfig::development()
        };

        Figment::from(Serialized::defaults(base))
            .merge(Toml::file(path))
            .merge(Env::prefixed("HYPNOS_").split("__"))
    }

    /// 验证配置
    pub fn validate(config: &AppConfig) -> Result<(), ConfigValidationError> {
        if config.server.port == 0 {
            return Err(ConfigValidationError::InvalidPort);
        }

        if config.database.backend == StorageBackend::Surrealdb && config.database.url.is_empty() {
            return Err(ConfigValidationError::MissingDatabaseUrl);
        }

        if config.transaction.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidRetryBudget);
        }

        if config.security.jwt_auth_enabled && config.security.jwt_secret.len() < 32 {
            return Err(ConfigValidationError::WeakJwtSecret);
        }

        if !config.security.jwt_auth_enabled && !config.security.api_key_auth_enabled {
            return Err(ConfigValidationError::NoAuthenticator);
        }

        Ok(())
    }
}

/// 配置验证错误
#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigValidationError {
    #[error("服务端口无效，必须大于 0")]
    InvalidPort,

    #[error("数据库连接 URL 未配置")]
    MissingDatabaseUrl,

    #[error("事务最大尝试次数必须大于 0")]
    InvalidRetryBudget,

    #[error("JWT 密钥长度不足 32 字节")]
    WeakJwtSecret,

    #[error("至少需要启用一种认证方式")]
    NoAuthenticator,
}

/// 获取默认配置文件路径
pub fn default_config_path() -> PathBuf {
    std::env::var("HYPNOS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("hypnos.toml"))
}
