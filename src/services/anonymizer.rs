//! 去标识化
//!
//! 把会话与画像投影为不含用户、会话标识的人群样本。

use chrono::{DateTime, Utc};

use crate::models::cohort::AnonymizedSample;
use crate::models::daily_aggregate::DayType;
use crate::models::profile::UserProfile;
use crate::models::session::SleepSession;

pub fn anonymize(session: &SleepSession, profile: &UserProfile, now: DateTime<Utc>) -> AnonymizedSample {
    AnonymizedSample {
        duration: session.duration,
        quality: session.quality_score,
        age_group: profile.age_group.clone(),
        occupation: profile.occupation.clone(),
        phone_usage_time: profile.phone_usage_time,
        day_type: DayType::from_date(session.start_date()),
        timestamp: now,
    }
}
