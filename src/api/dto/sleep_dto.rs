//! 睡眠会话 DTO

use serde::{Deserialize, Serialize};

use crate::services::upload::UploadReceipt;

/// 上传请求
///
/// 会话与画像保持原始 JSON，由服务层校验，以便报告具体字段。
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UploadSessionRequest {
    pub sleep_session: serde_json::Value,
    pub user_profile: Option<serde_json::Value>,
}

/// 上传响应
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSessionResponse {
    pub success: bool,
    pub message: String,
    pub session_id: String,
}

impl From<UploadReceipt> for UploadSessionResponse {
    fn from(receipt: UploadReceipt) -> Self {
        Self {
            success: receipt.success,
            message: receipt.message,
            session_id: receipt.session_id,
        }
    }
}
