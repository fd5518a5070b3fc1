//! 上传服务
//!
//! 一次上传在单个原子批次中写入三类记录：会话、日汇总、人群统计。
//! 人群统计是所有同组用户共享的记录，采用"快照读取 → 计算 → 带版本条件提交"的乐观并发，
//! 冲突时退避并从读取重新开始。

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::config::TransactionConfig;
use crate::error::{AppError, Result};
use crate::models::cohort::CohortStatistic;
use crate::models::profile::UserProfile;
use crate::models::session::{SessionRecord, SleepSession};
use crate::observability::AppMetrics;
use crate::services::aggregate::daily_aggregate;
use crate::services::anonymizer::anonymize;
use crate::services::retry::Backoff;
use crate::services::validator::{validate_sleep_session, validate_user_profile};
use crate::storage::store::{CohortWrite, CommitOutcome, SleepStore, UploadBatch};

/// 对外的失败消息
pub const UPLOAD_FAILED: &str = "failed to save sleep data";

/// 上传回执
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub success: bool,
    pub message: String,
    pub session_id: String,
}

/// 上传服务 trait
#[async_trait]
pub trait UploadService: Send + Sync {
    /// 校验并原子写入一次睡眠会话
    async fn upload(
        &self,
        user_id: &str,
        raw_session: &Value,
        raw_profile: Option<&Value>,
    ) -> Result<UploadReceipt>;
}

/// 上传服务实现
pub struct UploadServiceImpl {
    store: Arc<dyn SleepStore>,
    config: TransactionConfig,
    metrics: Arc<AppMetrics>,
}

impl UploadServiceImpl {
    /// 创建新的服务实例
    pub fn new(
        store: Arc<dyn SleepStore>,
        config: TransactionConfig,
        metrics: Arc<AppMetrics>,
    ) -> Self {
        Self {
            store,
            config,
            metrics,
        }
    }

    /// 构造一次尝试的写入批次
    ///
    /// 带画像时先读取人群统计快照；时间戳在每次尝试时重新生成。
    async fn build_batch(
        &self,
        user_id: &str,
        session_id: &str,
        session: &SleepSession,
        profile: Option<&UserProfile>,
    ) -> Result<UploadBatch> {
        let now = Utc::now();
        let record = SessionRecord {
            id: session_id.to_string(),
            user_id: user_id.to_string(),
            session: session.clone(),
            created_at: now,
        };
        let daily = daily_aggregate(user_id, session, session.start_date(), now);

        let cohort = match profile {
            None => None,
            Some(profile) => {
                let sample = anonymize(session, profile, now);
                let write = match self.store.read_cohort(&sample.cohort_key()).await? {
                    None => CohortWrite::Create(CohortStatistic::first(&sample, now)),
                    Some(snapshot) => CohortWrite::Update {
                        expected_version: snapshot.version,
                        record: CohortStatistic::absorb(&snapshot.record, &sample, now),
                    },
                };
                Some(write)
            }
        };

        Ok(UploadBatch {
            session: record,
            daily,
            cohort,
        })
    }

    async fn try_upload(
        &self,
        user_id: &str,
        raw_session: &Value,
        raw_profile: Option<&Value>,
    ) -> Result<UploadReceipt> {
        let session = validate_sleep_session(raw_session)?;
        let profile = raw_profile
            .filter(|p| !p.is_null())
            .map(validate_user_profile)
            .transpose()?;

        // 同一次上传的所有尝试共用一个会话 ID，失败的尝试不会留下任何记录
        let session_id = Uuid::new_v4().to_string();
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = Backoff::from_config(&self.config);

        for attempt in 1..=max_attempts {
            let batch = self
                .build_batch(user_id, &session_id, &session, profile.as_ref())
                .await?;

            match self.store.commit(&batch).await? {
                CommitOutcome::Committed => {
                    self.metrics.commit_attempts.observe(attempt as f64);
                    tracing::info!(
                        user_id = %user_id,
                        session_id = %session_id,
                        cohort = ?batch.cohort.as_ref().map(|w| w.key().to_string()),
                        attempt,
                        "sleep session committed"
                    );
                    return Ok(UploadReceipt {
                        success: true,
                        message: "Sleep data uploaded successfully".to_string(),
                        session_id,
                    });
                }
                CommitOutcome::Conflict => {
                    self.metrics.commit_conflicts_total.inc();
                    if attempt < max_attempts {
                        let wait = backoff.next_wait();
                        tracing::debug!(
                            session_id = %session_id,
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            "cohort conflict, retrying"
                        );
                        tokio::time::sleep(wait).await;
                    }
                }
            }
        }

        self.metrics.commit_attempts.observe(max_attempts as f64);
        Err(AppError::TransactionExhausted {
            attempts: max_attempts,
        })
    }
}

#[async_trait]
impl UploadService for UploadServiceImpl {
    async fn upload(
        &self,
        user_id: &str,
        raw_session: &Value,
        raw_profile: Option<&Value>,
    ) -> Result<UploadReceipt> {
        let result = self.try_upload(user_id, raw_session, raw_profile).await;
        let outcome = match &result {
            Ok(_) => "committed",
            Err(AppError::InvalidArgument { .. }) => "invalid",
            Err(_) => {
                self.metrics.record_error("upload");
                "failed"
            }
        };
        self.metrics.uploads_total.with_label_values(&[outcome]).inc();
        result.map_err(|e| e.into_boundary("upload_sleep_session", UPLOAD_FAILED))
    }
}

/// 创建上传服务
pub fn create_upload_service(
    store: Arc<dyn SleepStore>,
    config: TransactionConfig,
    metrics: Arc<AppMetrics>,
) -> Box<dyn UploadService> {
    Box::new(UploadServiceImpl::new(store, config, metrics))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::cohort::CohortKey;
    use crate::storage::memory::{CommitStage, MemoryStore};
    use crate::storage::store::{MockSleepStore, collections};
    use chrono::NaiveDate;
    use serde_json::json;

    fn fast_config(max_attempts: u32) -> TransactionConfig {
        TransactionConfig {
            max_attempts,
            initial_backoff_ms: 1,
            max_backoff_ms: 4,
        }
    }

    fn service(store: Arc<dyn SleepStore>, max_attempts: u32) -> UploadServiceImpl {
        UploadServiceImpl::new(
            store,
            fast_config(max_attempts),
            Arc::new(AppMetrics::new().unwrap()),
        )
    }

    fn session(duration: f64, quality: f64) -> Value {
        json!({
            "startTime": "2024-03-02T23:30:00Z",
            "endTime": "2024-03-03T07:00:00Z",
            "duration": duration,
            "qualityScore": quality,
            "movements": [1, 2, 3]
        })
    }

    fn profile() -> Value {
        json!({"ageGroup": "30s", "occupation": "engineer", "phoneUsageTime": 90})
    }

    #[tokio::test]
    async fn test_upload_writes_session_daily_and_cohort() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone(), 3);

        let receipt = svc
            .upload("user-1", &session(450.0, 80.0), Some(&profile()))
            .await
            .unwrap();
        assert!(receipt.success);

        let sessions = store.list_sessions("user-1").await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, receipt.session_id);

        let date = NaiveDate::from_ymd_opt(2024, 3, 2).unwrap();
        let daily = store.get_daily_aggregate("user-1", date).await.unwrap().unwrap();
        assert_eq!(daily.movement_count, 3);
        assert_eq!(daily.sleep_quality, 80.0);

        let cohort = store
            .get_cohort(&CohortKey::new("30s", "engineer"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cohort.total_sessions, 1);
        assert_eq!(cohort.avg_duration, 450.0);
    }

    #[tokio::test]
    async fn test_second_upload_moves_the_average() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone(), 3);

        svc.upload("a", &session(400.0, 60.0), Some(&profile())).await.unwrap();
        svc.upload("b", &session(500.0, 90.0), Some(&profile())).await.unwrap();

        let cohort = store
            .get_cohort(&CohortKey::new("30s", "engineer"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cohort.total_sessions, 2);
        assert_eq!(cohort.avg_duration, 450.0);
        assert_eq!(cohort.avg_quality, 75.0);
    }

    #[tokio::test]
    async fn test_upload_without_profile_skips_cohort() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone(), 3);

        svc.upload("user-1", &session(450.0, 80.0), None).await.unwrap();
        svc.upload("user-1", &session(450.0, 80.0), Some(&Value::Null)).await.unwrap();

        assert_eq!(store.count(collections::SESSIONS), 2);
        assert_eq!(store.count(collections::COHORT_STATS), 0);
    }

    #[tokio::test]
    async fn test_invalid_session_touches_nothing() {
        // 任何存储调用都会让 mock panic
        let store = MockSleepStore::new();
        let svc = service(Arc::new(store), 3);

        let mut raw = session(450.0, 80.0);
        raw["qualityScore"] = json!(120);
        let err = svc.upload("user-1", &raw, Some(&profile())).await.unwrap_err();
        assert!(matches!(err, AppError::InvalidArgument { ref field, .. } if field == "qualityScore"));
    }

    #[tokio::test]
    async fn test_invalid_profile_rejected_before_transaction() {
        let store = MockSleepStore::new();
        let svc = service(Arc::new(store), 3);

        let err = svc
            .upload("user-1", &session(450.0, 80.0), Some(&json!({"ageGroup": "30s"})))
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::InvalidArgument { ref field, .. } if field == "userProfile.occupation")
        );
    }

    #[tokio::test]
    async fn test_retry_exhaustion_is_internal() {
        let mut store = MockSleepStore::new();
        store.expect_read_cohort().times(4).returning(|_| Ok(None));
        store
            .expect_commit()
            .times(4)
            .returning(|_| Ok(CommitOutcome::Conflict));
        let svc = service(Arc::new(store), 4);

        let err = svc
            .upload("user-1", &session(450.0, 80.0), Some(&profile()))
            .await
            .unwrap_err();
        match err {
            AppError::Internal(message) => assert_eq!(message, UPLOAD_FAILED),
            other => panic!("expected Internal, got {:?}", other),
        }
        assert_eq!(svc.metrics.commit_conflicts_total.get(), 4);
    }

    #[tokio::test]
    async fn test_read_failure_is_internal_without_commit() {
        let mut store = MockSleepStore::new();
        store
            .expect_read_cohort()
            .times(1)
            .returning(|_| Err(AppError::Database("connection reset".into())));
        store.expect_commit().never();
        let svc = service(Arc::new(store), 3);

        let err = svc
            .upload("user-1", &session(450.0, 80.0), Some(&profile()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(!err.to_string().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_conflict_then_commit_reuses_session_id() {
        let mut store = MockSleepStore::new();
        store.expect_read_cohort().times(2).returning(|_| Ok(None));
        let mut seen: Vec<String> = Vec::new();
        let mut calls = 0;
        store.expect_commit().times(2).returning(move |batch| {
            seen.push(batch.session.id.clone());
            calls += 1;
            if calls == 1 {
                Ok(CommitOutcome::Conflict)
            } else {
                assert_eq!(seen[0], seen[1]);
                Ok(CommitOutcome::Committed)
            }
        });
        let svc = service(Arc::new(store), 3);

        let receipt = svc
            .upload("user-1", &session(450.0, 80.0), Some(&profile()))
            .await
            .unwrap();
        assert!(receipt.success);
    }

    #[tokio::test]
    async fn test_fault_after_session_insert_leaves_nothing() {
        let store = Arc::new(MemoryStore::new());
        let svc = service(store.clone(), 3);
        store.inject_fault(CommitStage::AfterSessionInsert);

        let err = svc
            .upload("user-1", &session(450.0, 80.0), Some(&profile()))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        assert_eq!(store.count(collections::SESSIONS), 0);
        assert_eq!(store.count(collections::DAILY_AGGREGATES), 0);
        assert_eq!(store.count(collections::COHORT_STATS), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_uploads_keep_exact_mean() {
        const N: usize = 24;
        let store = Arc::new(MemoryStore::new());
        let svc = Arc::new(service(store.clone(), N as u32 + 1));

        let durations: Vec<f64> = (0..N).map(|i| 360.0 + (i as f64) * 7.5).collect();
        let qualities: Vec<f64> = (0..N).map(|i| 50.0 + (i as f64 * 13.0) % 50.0).collect();

        let mut handles = Vec::new();
        for i in 0..N {
            let svc = svc.clone();
            let raw = session(durations[i], qualities[i]);
            handles.push(tokio::spawn(async move {
                svc.upload(&format!("user-{}", i), &raw, Some(&profile())).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let cohort = store
            .get_cohort(&CohortKey::new("30s", "engineer"))
            .await
            .unwrap()
            .unwrap();
        let mean = |xs: &[f64]| xs.iter().sum::<f64>() / xs.len() as f64;
        assert_eq!(cohort.total_sessions, N as u64);
        assert!((cohort.avg_duration - mean(&durations)).abs() < 1e-9);
        assert!((cohort.avg_quality - mean(&qualities)).abs() < 1e-9);
        assert_eq!(store.count(collections::SESSIONS), N);
    }
}
