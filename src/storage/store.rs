//! 事务型文档存储抽象
//!
//! 写路径采用乐观并发：先读取带版本号的人群统计快照，计算新值，
//! 再以一个批次原子提交。批次中的人群写入带版本条件，版本不符时整批放弃并返回
//! [`CommitOutcome::Conflict`]，由调用方从读取步骤重新开始。

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::Result;
use crate::models::cohort::{CohortKey, CohortStatistic};
use crate::models::daily_aggregate::DailyAggregate;
use crate::models::session::SessionRecord;
use crate::models::trend::TrendPoint;

/// 集合名称
pub mod collections {
    pub const SESSIONS: &str = "sleep_session";
    pub const DAILY_AGGREGATES: &str = "daily_aggregate";
    pub const COHORT_STATS: &str = "cohort_stat";
    pub const TRENDS: &str = "trend_point";
}

/// 带版本号的记录
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub record: T,
}

/// 人群统计的条件写入
#[derive(Debug, Clone, PartialEq)]
pub enum CohortWrite {
    /// 仅当记录不存在时创建
    Create(CohortStatistic),
    /// 仅当版本号未变化时覆盖
    Update {
        expected_version: u64,
        record: CohortStatistic,
    },
}

impl CohortWrite {
    pub fn record(&self) -> &CohortStatistic {
        match self {
            CohortWrite::Create(record) => record,
            CohortWrite::Update { record, .. } => record,
        }
    }

    pub fn key(&self) -> CohortKey {
        self.record().key()
    }
}

/// 一次上传对应的原子写入批次
#[derive(Debug, Clone, PartialEq)]
pub struct UploadBatch {
    /// 新会话，键不得已存在
    pub session: SessionRecord,
    /// 日汇总，按字段合并写入
    pub daily: DailyAggregate,
    /// 人群统计条件写入，无画像时为 None
    pub cohort: Option<CohortWrite>,
}

/// 提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// 所有写入已生效
    Committed,
    /// 乐观读取失效，未写入任何数据
    Conflict,
}

/// 睡眠数据存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SleepStore: Send + Sync {
    /// 读取人群统计及其版本号（事务快照读）
    async fn read_cohort(&self, key: &CohortKey) -> Result<Option<Versioned<CohortStatistic>>>;

    /// 原子提交一个上传批次
    async fn commit(&self, batch: &UploadBatch) -> Result<CommitOutcome>;

    /// 非事务读取人群统计
    async fn get_cohort(&self, key: &CohortKey) -> Result<Option<CohortStatistic>>;

    /// 读取闭区间 `[from, to]` 内的趋势点，按日期升序
    async fn trend_points(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<TrendPoint>>;

    /// 写入趋势点（供外部汇总任务使用）
    async fn put_trend_point(&self, point: &TrendPoint) -> Result<()>;

    /// 读取用户某天的日汇总
    async fn get_daily_aggregate(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAggregate>>;

    /// 列出用户的全部会话，按写入时间升序
    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>>;

    /// 存储可用性检查
    async fn health_check(&self) -> Result<()>;
}
