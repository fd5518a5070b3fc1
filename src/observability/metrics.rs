//! Prometheus 指标

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// 应用指标
///
/// 所有指标注册在独立的 [`Registry`] 上，由 `/metrics` 导出。
#[derive(Clone)]
pub struct AppMetrics {
    registry: Registry,

    /// 上传结果计数，label: outcome = committed | invalid | failed
    pub uploads_total: IntCounterVec,
    /// 乐观提交冲突次数
    pub commit_conflicts_total: IntCounter,
    /// 每次上传的提交尝试次数
    pub commit_attempts: Histogram,
    /// 人群统计查询，label: result = hit | empty
    pub cohort_queries_total: IntCounterVec,
    /// 趋势查询次数
    pub trend_queries_total: IntCounter,
    /// 边界处折叠为 Internal 的错误，label: operation
    pub errors_total: IntCounterVec,

    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,
}

impl AppMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("hypnos".to_string()), None)?;

        let uploads_total = IntCounterVec::new(
            Opts::new("uploads_total", "Sleep session uploads by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(uploads_total.clone()))?;

        let commit_conflicts_total = IntCounter::new(
            "commit_conflicts_total",
            "Optimistic commit conflicts on cohort statistics",
        )?;
        registry.register(Box::new(commit_conflicts_total.clone()))?;

        let commit_attempts = Histogram::with_opts(
            HistogramOpts::new("commit_attempts", "Commit attempts per upload")
                .buckets(vec![1.0, 2.0, 3.0, 5.0, 8.0, 13.0]),
        )?;
        registry.register(Box::new(commit_attempts.clone()))?;

        let cohort_queries_total = IntCounterVec::new(
            Opts::new("cohort_queries_total", "Cohort statistic lookups"),
            &["result"],
        )?;
        registry.register(Box::new(cohort_queries_total.clone()))?;

        let trend_queries_total = IntCounter::new("trend_queries_total", "Trend queries")?;
        registry.register(Box::new(trend_queries_total.clone()))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Internal errors by operation"),
            &["operation"],
        )?;
        registry.register(Box::new(errors_total.clone()))?;

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "Total HTTP requests"),
            &["method", "status"],
        )?;
        registry.register(Box::new(http_requests_total.clone()))?;

        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["method"],
        )?;
        registry.register(Box::new(http_request_duration.clone()))?;

        Ok(Self {
            registry,
            uploads_total,
            commit_conflicts_total,
            commit_attempts,
            cohort_queries_total,
            trend_queries_total,
            errors_total,
            http_requests_total,
            http_request_duration,
        })
    }

    /// 记录 HTTP 请求
    pub fn record_http_request(&self, method: &str, status: u16, seconds: f64) {
        self.http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
        self.http_request_duration
            .with_label_values(&[method])
            .observe(seconds);
    }

    /// 记录错误
    pub fn record_error(&self, operation: &str) {
        self.errors_total.with_label_values(&[operation]).inc();
    }

    /// 生成 Prometheus 文本格式
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
