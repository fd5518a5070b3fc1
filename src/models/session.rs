use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 睡眠测量会话
///
/// 由校验器从请求体构造，字段均已通过范围检查。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SleepSession {
    /// 入睡时间
    pub start_time: DateTime<Utc>,
    /// 起床时间
    pub end_time: DateTime<Utc>,
    /// 睡眠时长（非负）
    pub duration: f64,
    /// 睡眠质量评分 [0, 100]
    pub quality_score: f64,
    /// 体动记录，未上传时为 None
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movements: Option<Vec<serde_json::Value>>,
}

impl SleepSession {
    /// 体动次数，未上传体动记录时为 0
    pub fn movement_count(&self) -> u32 {
        self.movements.as_ref().map_or(0, |m| m.len() as u32)
    }

    /// 会话所属日历日（UTC）
    pub fn start_date(&self) -> NaiveDate {
        self.start_time.date_naive()
    }
}

/// 已持久化的会话记录
///
/// 写入后不可变，只归属于上传者本人。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// 会话唯一标识，文档中以 `sessionId` 存储，避免与记录 id 冲突
    #[serde(rename = "sessionId")]
    pub id: String,
    /// 所属用户
    pub user_id: String,
    /// 会话内容
    #[serde(flatten)]
    pub session: SleepSession,
    /// 服务端写入时间
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// 为用户创建一条新的会话记录（新 UUID）
    pub fn new(user_id: &str, session: SleepSession) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            session,
            created_at: Utc::now(),
        }
    }

    /// 存储键：`<userId>/<sessionId>`
    pub fn storage_key(&self) -> String {
        format!("{}/{}", self.user_id, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(movements: Option<Vec<serde_json::Value>>) -> SleepSession {
        SleepSession {
            start_time: Utc.with_ymd_and_hms(2024, 3, 2, 23, 30, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2024, 3, 3, 7, 0, 0).unwrap(),
            duration: 450.0,
            quality_score: 82.0,
            movements,
        }
    }

    #[test]
    fn test_movement_count_defaults_to_zero() {
        assert_eq!(session(None).movement_count(), 0);
        assert_eq!(session(Some(vec![])).movement_count(), 0);
        assert_eq!(
            session(Some(vec![serde_json::json!({"t": 1}), serde_json::json!({"t": 2})]))
                .movement_count(),
            2
        );
    }

    #[test]
    fn test_records_get_distinct_keys() {
        let a = SessionRecord::new("user-1", session(None));
        let b = SessionRecord::new("user-1", session(None));
        assert_ne!(a.storage_key(), b.storage_key());
        assert!(a.storage_key().starts_with("user-1/"));
    }

    #[test]
    fn test_record_serializes_flat_camel_case() {
        let record = SessionRecord::new("user-1", session(None));
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["userId"], "user-1");
        assert_eq!(value["qualityScore"], 82.0);
        assert!(value.get("movements").is_none());
        assert!(value.get("session").is_none());
    }

    #[test]
    fn test_record_id_is_stored_as_session_id() {
        let record = SessionRecord::new("user-1", session(None));
        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["sessionId"], record.id.as_str());

        let back: SessionRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back, record);
    }
}
