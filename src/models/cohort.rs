//! 人群统计模型
//!
//! 以 `年龄段 × 职业` 为键的匿名化统计。所有同组用户竞争写同一条记录。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::daily_aggregate::DayType;

/// 人群分组键
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CohortKey {
    pub age_group: String,
    pub occupation: String,
}

impl CohortKey {
    pub fn new(age_group: impl Into<String>, occupation: impl Into<String>) -> Self {
        Self {
            age_group: age_group.into(),
            occupation: occupation.into(),
        }
    }
}

/// 存储键格式：`<ageGroup>-<occupation>`
impl fmt::Display for CohortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.age_group, self.occupation)
    }
}

/// 去标识化样本
///
/// 不含任何用户或会话标识。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnonymizedSample {
    pub duration: f64,
    pub quality: f64,
    pub age_group: String,
    pub occupation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_usage_time: Option<f64>,
    pub day_type: DayType,
    pub timestamp: DateTime<Utc>,
}

impl AnonymizedSample {
    pub fn cohort_key(&self) -> CohortKey {
        CohortKey::new(&self.age_group, &self.occupation)
    }
}

/// 人群统计记录
///
/// `avg_duration` / `avg_quality` 始终是恰好 `total_sessions` 个样本的算术平均。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CohortStatistic {
    pub age_group: String,
    pub occupation: String,
    pub total_sessions: u64,
    pub avg_duration: f64,
    pub avg_quality: f64,
    /// 由上游离线分析写入，本服务只透传
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_usage_correlation: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CohortStatistic {
    pub fn key(&self) -> CohortKey {
        CohortKey::new(&self.age_group, &self.occupation)
    }
}

/// 人群统计查询结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CohortView {
    pub age_group: String,
    pub occupation: String,
    pub avg_sleep_duration: f64,
    pub avg_sleep_quality: f64,
    pub sample_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_usage_impact: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    /// 数据不足时的提示
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CohortView {
    pub const INSUFFICIENT_DATA: &'static str = "insufficient data";

    /// 无记录时的空视图
    pub fn empty(key: &CohortKey) -> Self {
        Self {
            age_group: key.age_group.clone(),
            occupation: key.occupation.clone(),
            avg_sleep_duration: 0.0,
            avg_sleep_quality: 0.0,
            sample_size: 0,
            phone_usage_impact: None,
            last_updated: None,
            message: Some(Self::INSUFFICIENT_DATA.to_string()),
        }
    }

    /// 是否为空视图
    pub fn is_insufficient(&self) -> bool {
        self.message.as_deref() == Some(Self::INSUFFICIENT_DATA)
    }
}

impl From<CohortStatistic> for CohortView {
    fn from(stat: CohortStatistic) -> Self {
        Self {
            age_group: stat.age_group,
            occupation: stat.occupation,
            avg_sleep_duration: stat.avg_duration,
            avg_sleep_quality: stat.avg_quality,
            sample_size: stat.total_sessions,
            phone_usage_impact: stat.phone_usage_correlation,
            last_updated: Some(stat.last_updated),
            message: None,
        }
    }
}
