use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 日趋势点
///
/// 由外部汇总任务写入，本服务只读。未知字段原样透传。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_quality: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TrendPoint {
    pub fn new(date: NaiveDate, avg_duration: Option<f64>, avg_quality: Option<f64>) -> Self {
        Self {
            date,
            avg_duration,
            avg_quality,
            extra: serde_json::Map::new(),
        }
    }

    /// 存储键：`YYYY-MM-DD`
    pub fn storage_key(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

/// 趋势方向
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TrendLabel {
    Improving,
    Declining,
    Stable,
    InsufficientData,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TrendLabel::Improving => "improving",
            TrendLabel::Declining => "declining",
            TrendLabel::Stable => "stable",
            TrendLabel::InsufficientData => "insufficient_data",
        };
        f.write_str(s)
    }
}

/// 趋势摘要
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendSummary {
    pub avg_duration: f64,
    pub avg_quality: f64,
    pub trend: TrendLabel,
    pub data_points: usize,
}

impl TrendSummary {
    pub fn empty() -> Self {
        Self {
            avg_duration: 0.0,
            avg_quality: 0.0,
            trend: TrendLabel::InsufficientData,
            data_points: 0,
        }
    }
}

/// 趋势查询结果
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrendReport {
    /// 例如 "30days"
    pub period: String,
    pub trends: Vec<TrendPoint>,
    pub summary: TrendSummary,
}

/// 查询周期参数，既接受整数也接受字符串
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PeriodParam {
    Days(i64),
    Text(String),
}

impl Default for PeriodParam {
    fn default() -> Self {
        PeriodParam::Text("30".to_string())
    }
}
