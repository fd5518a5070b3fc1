//! 核心数据模型模块
//!
//! 定义 Hypnos 的核心数据结构：SleepSession, DailyAggregate, CohortStatistic, TrendPoint 等。

pub mod cohort;
pub mod daily_aggregate;
pub mod profile;
pub mod session;
pub mod trend;

pub use cohort::*;
pub use daily_aggregate::*;
pub use profile::*;
pub use session::*;
pub use trend::*;
