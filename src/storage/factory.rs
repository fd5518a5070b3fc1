//! 存储工厂模块
//!
//! 根据配置创建相应的存储实例。

use crate::config::config::{DatabaseConfig, StorageBackend};
#[cfg(not(feature = "surrealdb"))]
use crate::error::AppError;
use crate::error::Result;
use crate::storage::memory::MemoryStore;
use crate::storage::store::SleepStore;
use std::sync::Arc;

#[cfg(feature = "surrealdb")]
use crate::storage::surrealdb::{SurrealPool, SurrealStore};

/// 存储工厂
pub struct StorageFactory;

impl StorageFactory {
    /// 根据配置创建存储实例
    pub async fn create(config: &DatabaseConfig) -> Result<Arc<dyn SleepStore>> {
        match config.backend {
            StorageBackend::Memory => {
                tracing::warn!("using in-memory storage, data will not survive a restart");
                Ok(Arc::new(MemoryStore::new()))
            }
            #[cfg(feature = "surrealdb")]
            StorageBackend::Surrealdb => {
                let pool = SurrealPool::new(config).await?;
                tracing::info!(
                    url = %config.url,
                    namespace = %config.namespace,
                    database = %config.database,
                    "connected to SurrealDB"
                );
                Ok(Arc::new(SurrealStore::new(pool)))
            }
            #[cfg(not(feature = "surrealdb"))]
            StorageBackend::Surrealdb => Err(AppError::Config(
                "SurrealDB feature is not enabled. Enable 'surrealdb' feature to use SurrealDB."
                    .into(),
            )),
        }
    }

    /// 检查存储是否可用
    pub async fn health_check(storage: &dyn SleepStore) -> bool {
        match storage.health_check().await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "storage health check failed");
                false
            }
        }
    }
}
