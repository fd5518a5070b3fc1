use serde::Deserialize;

use crate::models::trend::PeriodParam;

/// 趋势查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TrendParams {
    /// 天数，查询串中总是字符串
    pub period: Option<String>,
}

impl TrendParams {
    pub fn period(&self) -> Option<PeriodParam> {
        self.period.clone().map(PeriodParam::Text)
    }
}
