//! 趋势查询
//!
//! 读取外部汇总任务写入的日趋势点，计算摘要和前后两段的趋势方向。

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::trend::{PeriodParam, TrendLabel, TrendPoint, TrendReport, TrendSummary};
use crate::observability::AppMetrics;
use crate::storage::store::SleepStore;

/// 前后两段质量均值差小于该值视为平稳
pub const STABLE_THRESHOLD: f64 = 2.0;

pub const DEFAULT_PERIOD_DAYS: i64 = 30;
pub const MAX_PERIOD_DAYS: i64 = 365;

/// 解析查询周期（天），只接受 `[1, 365]` 内的整数
pub fn parse_period(param: Option<&PeriodParam>) -> Result<i64> {
    let days = match param {
        None => DEFAULT_PERIOD_DAYS,
        Some(PeriodParam::Days(n)) => *n,
        Some(PeriodParam::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| AppError::invalid("period", "period must be an integer number of days"))?,
    };
    if !(1..=MAX_PERIOD_DAYS).contains(&days) {
        return Err(AppError::invalid(
            "period",
            format!("period must be between 1 and {} days", MAX_PERIOD_DAYS),
        ));
    }
    Ok(days)
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn quality(point: &TrendPoint) -> f64 {
    point.avg_quality.unwrap_or(0.0)
}

/// 前 `floor(n/2)` 个点与其余点的质量均值比较
fn label(points: &[TrendPoint]) -> TrendLabel {
    if points.len() < 2 {
        return TrendLabel::InsufficientData;
    }
    let (first, second) = points.split_at(points.len() / 2);
    let diff = mean(second.iter().map(quality)) - mean(first.iter().map(quality));

    if diff.abs() < STABLE_THRESHOLD {
        TrendLabel::Stable
    } else if diff > 0.0 {
        TrendLabel::Improving
    } else {
        TrendLabel::Declining
    }
}

/// 计算趋势摘要，缺失字段按 0 计入均值
pub fn summarize(points: &[TrendPoint]) -> TrendSummary {
    if points.is_empty() {
        return TrendSummary::empty();
    }
    TrendSummary {
        avg_duration: mean(points.iter().map(|p| p.avg_duration.unwrap_or(0.0))),
        avg_quality: mean(points.iter().map(quality)),
        trend: label(points),
        data_points: points.len(),
    }
}

/// 趋势服务 trait
#[async_trait]
pub trait TrendService: Send + Sync {
    /// 查询最近 `period` 天的趋势
    async fn trends(&self, period: Option<PeriodParam>) -> Result<TrendReport>;
}

/// 趋势服务实现
pub struct TrendServiceImpl {
    store: Arc<dyn SleepStore>,
    metrics: Arc<AppMetrics>,
}

impl TrendServiceImpl {
    pub fn new(store: Arc<dyn SleepStore>, metrics: Arc<AppMetrics>) -> Self {
        Self { store, metrics }
    }

    /// 以指定日期为"今天"查询，窗口为 `[today - days, today]`
    pub async fn trends_at(&self, period: Option<PeriodParam>, today: NaiveDate) -> Result<TrendReport> {
        let days = parse_period(period.as_ref())?;
        let from = today - Duration::days(days);

        let points = self.store.trend_points(from, today).await.map_err(|e| {
            self.metrics.record_error("trends");
            e.into_boundary("get_trends", "failed to load trends")
        })?;

        self.metrics.trend_queries_total.inc();
        let summary = summarize(&points);
        tracing::debug!(%from, %today, points = points.len(), trend = %summary.trend, "trend query");

        Ok(TrendReport {
            period: format!("{}days", days),
            trends: points,
            summary,
        })
    }
}

#[async_trait]
impl TrendService for TrendServiceImpl {
    async fn trends(&self, period: Option<PeriodParam>) -> Result<TrendReport> {
        self.trends_at(period, Utc::now().date_naive()).await
    }
}

/// 创建趋势服务
pub fn create_trend_service(
    store: Arc<dyn SleepStore>,
    metrics: Arc<AppMetrics>,
) -> Box<dyn TrendService> {
    Box::new(TrendServiceImpl::new(store, metrics))
}
