//! 存储层模块
//!
//! 提供事务型文档存储，支持进程内存储和 SurrealDB。

pub mod factory;
pub mod memory;
pub mod store;

#[cfg(feature = "surrealdb")]
pub mod surrealdb;

pub use factory::StorageFactory;
pub use memory::MemoryStore;
pub use store::{CohortWrite, CommitOutcome, SleepStore, UploadBatch, Versioned};
