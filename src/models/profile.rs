//! 用户画像
//!
//! 只随上传请求出现，用于推导人群分组，本身不落库。

use serde::{Deserialize, Serialize};

/// 上传时附带的用户画像
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    /// 年龄段，例如 "20s"
    pub age_group: String,
    /// 职业
    pub occupation: String,
    /// 手机使用时长，可缺省
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_usage_time: Option<f64>,
}
