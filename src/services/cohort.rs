//! 人群统计查询

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::cohort::{CohortKey, CohortView};
use crate::observability::AppMetrics;
use crate::storage::store::SleepStore;

/// 人群统计服务 trait
#[async_trait]
pub trait CohortService: Send + Sync {
    /// 按 `年龄段 × 职业` 查询统计；没有记录时返回空视图而不是错误
    async fn lookup(&self, age_group: Option<&str>, occupation: Option<&str>) -> Result<CohortView>;
}

/// 人群统计服务实现
pub struct CohortServiceImpl {
    store: Arc<dyn SleepStore>,
    metrics: Arc<AppMetrics>,
}

impl CohortServiceImpl {
    pub fn new(store: Arc<dyn SleepStore>, metrics: Arc<AppMetrics>) -> Self {
        Self { store, metrics }
    }
}

fn required<'a>(name: &str, value: Option<&'a str>) -> Result<&'a str> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AppError::invalid(name, format!("{} is required", name))),
    }
}

#[async_trait]
impl CohortService for CohortServiceImpl {
    async fn lookup(&self, age_group: Option<&str>, occupation: Option<&str>) -> Result<CohortView> {
        let key = CohortKey::new(
            required("ageGroup", age_group)?,
            required("occupation", occupation)?,
        );

        let found = self
            .store
            .get_cohort(&key)
            .await
            .map_err(|e| {
                self.metrics.record_error("cohort_stats");
                e.into_boundary("get_cohort_stats", "failed to load cohort statistics")
            })?;

        let view = match found {
            Some(stat) => CohortView::from(stat),
            None => CohortView::empty(&key),
        };
        let result = if view.is_insufficient() { "empty" } else { "hit" };
        self.metrics.cohort_queries_total.with_label_values(&[result]).inc();
        tracing::debug!(cohort = %key, sample_size = view.sample_size, "cohort lookup");
        Ok(view)
    }
}

/// 创建人群统计服务
pub fn create_cohort_service(
    store: Arc<dyn SleepStore>,
    metrics: Arc<AppMetrics>,
) -> Box<dyn CohortService> {
    Box::new(CohortServiceImpl::new(store, metrics))
}
