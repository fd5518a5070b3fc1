use serde::Deserialize;

/// 人群统计查询参数
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CohortStatsParams {
    pub age_group: Option<String>,
    pub occupation: Option<String>,
}
