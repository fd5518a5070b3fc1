//! 上传数据校验
//!
//! 在任何写入之前检查会话与画像，返回带类型的记录。

use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::error::{AppError, Result};
use crate::models::profile::UserProfile;
use crate::models::session::SleepSession;

/// 会话必填字段，按检查顺序排列
const REQUIRED_SESSION_FIELDS: [&str; 4] = ["startTime", "endTime", "duration", "qualityScore"];

const MAX_QUALITY: f64 = 100.0;

/// 取字段值，`null` 视为缺失
fn field<'a>(object: &'a serde_json::Map<String, Value>, name: &str) -> Option<&'a Value> {
    object.get(name).filter(|v| !v.is_null())
}

/// 解析时间戳：RFC 3339 字符串或毫秒级 Unix 时间
fn parse_timestamp(name: &str, value: &Value) -> Result<DateTime<Utc>> {
    let parsed = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    };
    parsed.ok_or_else(|| AppError::invalid(name, format!("{} must be an RFC 3339 timestamp or epoch milliseconds", name)))
}

fn non_negative(name: &str, value: &Value) -> Result<f64> {
    value
        .as_f64()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .ok_or_else(|| AppError::invalid(name, format!("{} must be a non-negative number", name)))
}

/// 校验睡眠会话
pub fn validate_sleep_session(raw: &Value) -> Result<SleepSession> {
    let object = raw
        .as_object()
        .ok_or_else(|| AppError::invalid("sleepSession", "sleepSession must be an object"))?;

    for name in REQUIRED_SESSION_FIELDS {
        if field(object, name).is_none() {
            return Err(AppError::invalid(name, format!("missing required field: {}", name)));
        }
    }

    let start_time = parse_timestamp("startTime", &object["startTime"])?;
    let end_time = parse_timestamp("endTime", &object["endTime"])?;
    let duration = non_negative("duration", &object["duration"])?;

    let quality_score = object["qualityScore"]
        .as_f64()
        .filter(|q| (0.0..=MAX_QUALITY).contains(q))
        .ok_or_else(|| AppError::invalid("qualityScore", "qualityScore must be a number between 0 and 100"))?;

    let movements = match field(object, "movements") {
        None => None,
        Some(Value::Array(items)) => Some(items.clone()),
        Some(_) => return Err(AppError::invalid("movements", "movements must be an array")),
    };

    Ok(SleepSession {
        start_time,
        end_time,
        duration,
        quality_score,
        movements,
    })
}

/// 校验用户画像
pub fn validate_user_profile(raw: &Value) -> Result<UserProfile> {
    let object = raw
        .as_object()
        .ok_or_else(|| AppError::invalid("userProfile", "userProfile must be an object"))?;

    let text = |name: &str| -> Result<String> {
        let path = format!("userProfile.{}", name);
        match field(object, name).and_then(Value::as_str).map(str::trim) {
            Some(s) if !s.is_empty() => Ok(s.to_string()),
            _ => Err(AppError::invalid(&path, format!("{} must be a non-empty string", path))),
        }
    };

    let age_group = text("ageGroup")?;
    let occupation = text("occupation")?;
    let phone_usage_time = field(object, "phoneUsageTime")
        .map(|v| non_negative("userProfile.phoneUsageTime", v))
        .transpose()?;

    Ok(UserProfile {
        age_group,
        occupation,
        phone_usage_time,
    })
}
