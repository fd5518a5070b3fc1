use crate::config::config::AppConfig;
use crate::observability::AppMetrics;
use crate::security::auth::{Authenticator, CombinedAuthenticator};
use crate::services::{
    CohortService, TrendService, UploadService, create_cohort_service, create_trend_service,
    create_upload_service,
};
use crate::storage::store::SleepStore;
use std::sync::Arc;

/// Application state containing all shared services and security components
#[derive(Clone)]
pub struct AppState {
    /// Transactional document store
    pub store: Arc<dyn SleepStore>,
    /// Upload service: validation + atomic multi-record commit
    pub upload_service: Arc<dyn UploadService>,
    /// Cohort statistic lookups
    pub cohort_service: Arc<dyn CohortService>,
    /// Trend queries
    pub trend_service: Arc<dyn TrendService>,
    /// Authenticator for API key and JWT validation
    pub authenticator: Arc<dyn Authenticator>,
    /// Prometheus metrics
    pub metrics: Arc<AppMetrics>,
    /// Server settings used when building the router
    pub max_request_size: usize,
    pub request_timeout_secs: u64,
    pub cors_allowed_origins: Vec<String>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("store", &"Arc<dyn SleepStore>")
            .field("upload_service", &"Arc<dyn UploadService>")
            .field("cohort_service", &"Arc<dyn CohortService>")
            .field("trend_service", &"Arc<dyn TrendService>")
            .field("authenticator", &self.authenticator.authenticator_type())
            .field("max_request_size", &self.max_request_size)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl AppState {
    /// Create new application state
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn SleepStore>,
        metrics: Arc<AppMetrics>,
        authenticator: Box<dyn Authenticator>,
    ) -> Self {
        let upload_service =
            create_upload_service(store.clone(), config.transaction.clone(), metrics.clone());
        let cohort_service = create_cohort_service(store.clone(), metrics.clone());
        let trend_service = create_trend_service(store.clone(), metrics.clone());

        Self {
            store,
            upload_service: Arc::from(upload_service),
            cohort_service: Arc::from(cohort_service),
            trend_service: Arc::from(trend_service),
            authenticator: Arc::from(authenticator),
            metrics,
            max_request_size: config.server.max_request_size,
            request_timeout_secs: config.server.request_timeout,
            cors_allowed_origins: config.security.cors_allowed_origins.clone(),
        }
    }

    /// Create application state with the authenticator described by the config
    pub fn from_config(
        config: &AppConfig,
        store: Arc<dyn SleepStore>,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        let authenticator = Box::new(CombinedAuthenticator::from_config(&config.security));
        Self::new(config, store, metrics, authenticator)
    }
}
