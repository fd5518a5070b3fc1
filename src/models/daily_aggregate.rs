use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 工作日 / 周末
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DayType {
    Weekday,
    Weekend,
}

impl DayType {
    /// 周六、周日为周末，其余为工作日
    pub fn from_date(date: NaiveDate) -> Self {
        match date.weekday() {
            Weekday::Sat | Weekday::Sun => DayType::Weekend,
            _ => DayType::Weekday,
        }
    }
}

impl fmt::Display for DayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DayType::Weekday => write!(f, "weekday"),
            DayType::Weekend => write!(f, "weekend"),
        }
    }
}

/// 用户日汇总
///
/// 以 `(userId, date)` 为键；同一天的多次上传按字段覆盖（后写者胜）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyAggregate {
    pub user_id: String,
    /// UTC 日历日
    pub date: NaiveDate,
    pub sleep_duration: f64,
    pub sleep_quality: f64,
    pub bedtime: DateTime<Utc>,
    pub wake_time: DateTime<Utc>,
    pub movement_count: u32,
    pub day_type: DayType,
    pub created_at: DateTime<Utc>,
}

impl DailyAggregate {
    /// 存储键：`<userId>/<YYYY-MM-DD>`
    pub fn storage_key(user_id: &str, date: NaiveDate) -> String {
        format!("{}/{}", user_id, date.format("%Y-%m-%d"))
    }

    pub fn key(&self) -> String {
        Self::storage_key(&self.user_id, self.date)
    }
}
