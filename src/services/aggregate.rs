//! 聚合计算
//!
//! 纯函数：由会话得到日汇总，由样本推进人群统计的滑动平均。

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::cohort::{AnonymizedSample, CohortStatistic};
use crate::models::daily_aggregate::{DailyAggregate, DayType};
use crate::models::session::SleepSession;

/// 由会话构造日汇总
pub fn daily_aggregate(
    user_id: &str,
    session: &SleepSession,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> DailyAggregate {
    DailyAggregate {
        user_id: user_id.to_string(),
        date,
        sleep_duration: session.duration,
        sleep_quality: session.quality_score,
        bedtime: session.start_time,
        wake_time: session.end_time,
        movement_count: session.movement_count(),
        day_type: DayType::from_date(date),
        created_at: now,
    }
}

/// 增量平均
///
/// `prior_count` 为 0 时直接返回新值，不参与旧均值运算。
pub fn moving_average(current_avg: f64, new_value: f64, prior_count: u64) -> f64 {
    if prior_count == 0 {
        return new_value;
    }
    let n = prior_count as f64;
    (current_avg * n + new_value) / (n + 1.0)
}

impl CohortStatistic {
    /// 人群的第一个样本
    pub fn first(sample: &AnonymizedSample, now: DateTime<Utc>) -> Self {
        Self {
            age_group: sample.age_group.clone(),
            occupation: sample.occupation.clone(),
            total_sessions: 1,
            avg_duration: sample.duration,
            avg_quality: sample.quality,
            phone_usage_correlation: None,
            created_at: now,
            last_updated: now,
        }
    }

    /// 将一个样本并入已有统计
    pub fn absorb(prior: &CohortStatistic, sample: &AnonymizedSample, now: DateTime<Utc>) -> Self {
        let n = prior.total_sessions;
        Self {
            age_group: prior.age_group.clone(),
            occupation: prior.occupation.clone(),
            total_sessions: n + 1,
            avg_duration: moving_average(prior.avg_duration, sample.duration, n),
            avg_quality: moving_average(prior.avg_quality, sample.quality, n),
            phone_usage_correlation: prior.phone_usage_correlation,
            created_at: prior.created_at,
            last_updated: now,
        }
    }
}
