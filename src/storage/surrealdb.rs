use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use surrealdb::{
    Surreal,
    engine::any::{Any, connect},
    opt::auth::Root,
};

use crate::config::config::DatabaseConfig;
use crate::error::{AppError, Result};
use crate::models::cohort::{CohortKey, CohortStatistic};
use crate::models::daily_aggregate::DailyAggregate;
use crate::models::session::SessionRecord;
use crate::models::trend::TrendPoint;
use crate::storage::store::{
    CohortWrite, CommitOutcome, SleepStore, UploadBatch, Versioned, collections,
};

/// 人群统计版本冲突时事务内抛出的标记
const CONFLICT_MARKER: &str = "cohort_version_conflict";

/// 存储引擎检测到并发事务读写冲突时的提示
const RETRYABLE_MARKER: &str = "can be retried";

/// 事务失败后未执行语句的连带错误
const NOT_EXECUTED_MARKER: &str = "not executed due to a failed transaction";

/// 嵌入式引擎没有 root 用户，不需要登录
fn is_embedded(url: &str) -> bool {
    url == "memory" || ["mem://", "rocksdb://", "surrealkv://"].iter().any(|s| url.starts_with(s))
}

/// 乐观提交失败（版本守卫或引擎冲突），可由调用方重试
fn is_conflict(message: &str) -> bool {
    message.contains(CONFLICT_MARKER) || message.contains(RETRYABLE_MARKER)
}

/// SurrealDB 连接
#[derive(Clone)]
pub struct SurrealPool {
    db: Surreal<Any>,
}

impl SurrealPool {
    /// 连接数据库并选择命名空间
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.connection_timeout.max(1));
        let db: Surreal<Any> = tokio::time::timeout(timeout, connect(&config.url))
            .await
            .map_err(|_| AppError::Connection(format!("connect to {} timed out", config.url)))??;

        if !is_embedded(&config.url) {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        Ok(Self { db })
    }

    /// 数据库客户端
    pub fn client(&self) -> &Surreal<Any> {
        &self.db
    }
}

/// 人群统计行（含乐观锁版本号）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CohortRow {
    age_group: String,
    occupation: String,
    total_sessions: u64,
    avg_duration: f64,
    avg_quality: f64,
    #[serde(default)]
    phone_usage_correlation: Option<f64>,
    created_at: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    version: u64,
}

impl CohortRow {
    fn with_version(record: &CohortStatistic, version: u64) -> Self {
        Self {
            age_group: record.age_group.clone(),
            occupation: record.occupation.clone(),
            total_sessions: record.total_sessions,
            avg_duration: record.avg_duration,
            avg_quality: record.avg_quality,
            phone_usage_correlation: record.phone_usage_correlation,
            created_at: record.created_at,
            last_updated: record.last_updated,
            version,
        }
    }

    fn into_versioned(self) -> Versioned<CohortStatistic> {
        Versioned {
            version: self.version,
            record: CohortStatistic {
                age_group: self.age_group,
                occupation: self.occupation,
                total_sessions: self.total_sessions,
                avg_duration: self.avg_duration,
                avg_quality: self.avg_quality,
                phone_usage_correlation: self.phone_usage_correlation,
                created_at: self.created_at,
                last_updated: self.last_updated,
            },
        }
    }
}

/// 构造上传批次的事务语句
///
/// 人群统计的写入带条件：创建时要求记录不存在，更新时要求版本号未变，
/// 否则 THROW 使整个事务回滚。
fn commit_statement(cohort: Option<&CohortWrite>) -> String {
    let cohort_clause = match cohort {
        None => String::new(),
        Some(CohortWrite::Create(_)) => format!(
            "IF array::len((SELECT id FROM type::thing('{table}', $cohort_key))) > 0 \
             {{ THROW '{marker}' }};\n\
             CREATE type::thing('{table}', $cohort_key) CONTENT $cohort_doc;\n",
            table = collections::COHORT_STATS,
            marker = CONFLICT_MARKER,
        ),
        Some(CohortWrite::Update { .. }) => format!(
            "LET $updated = (UPDATE type::thing('{table}', $cohort_key) CONTENT $cohort_doc \
             WHERE version = $expected_version RETURN AFTER);\n\
             IF array::len($updated) == 0 {{ THROW '{marker}' }};\n",
            table = collections::COHORT_STATS,
            marker = CONFLICT_MARKER,
        ),
    };

    format!(
        "BEGIN TRANSACTION;\n\
         CREATE type::thing('{sessions}', $session_key) CONTENT $session_doc;\n\
         UPSERT type::thing('{daily}', $daily_key) MERGE $daily_doc;\n\
         {cohort_clause}\
         COMMIT TRANSACTION;",
        sessions = collections::SESSIONS,
        daily = collections::DAILY_AGGREGATES,
    )
}

/// SurrealDB 实现的 [`SleepStore`]
#[derive(Clone)]
pub struct SurrealStore {
    pool: SurrealPool,
}

impl SurrealStore {
    pub fn new(pool: SurrealPool) -> Self {
        Self { pool }
    }

    fn conflict(batch: &UploadBatch, reason: &str) -> CommitOutcome {
        tracing::debug!(session = %batch.session.id, reason, "cohort commit conflict");
        CommitOutcome::Conflict
    }
}

#[async_trait]
impl SleepStore for SurrealStore {
    async fn read_cohort(&self, key: &CohortKey) -> Result<Option<Versioned<CohortStatistic>>> {
        let row: Option<CohortRow> = self
            .pool
            .client()
            .select((collections::COHORT_STATS, key.to_string()))
            .await?;
        Ok(row.map(CohortRow::into_versioned))
    }

    async fn commit(&self, batch: &UploadBatch) -> Result<CommitOutcome> {
        let sql = commit_statement(batch.cohort.as_ref());

        let mut query = self
            .pool
            .client()
            .query(sql)
            .bind(("session_key", batch.session.storage_key()))
            .bind(("session_doc", serde_json::to_value(&batch.session)?))
            .bind(("daily_key", batch.daily.key()))
            .bind(("daily_doc", serde_json::to_value(&batch.daily)?));

        if let Some(write) = &batch.cohort {
            let (expected_version, next_version) = match write {
                CohortWrite::Create(_) => (0, 1),
                CohortWrite::Update {
                    expected_version, ..
                } => (*expected_version, expected_version + 1),
            };
            let row = CohortRow::with_version(write.record(), next_version);
            query = query
                .bind(("cohort_key", write.key().to_string()))
                .bind(("cohort_doc", serde_json::to_value(&row)?))
                .bind(("expected_version", expected_version));
        }

        let mut response = match query.await {
            Ok(response) => response,
            Err(e) if is_conflict(&e.to_string()) => {
                return Ok(Self::conflict(batch, "transaction"));
            }
            Err(e) => return Err(e.into()),
        };

        let mut errors: Vec<(usize, surrealdb::Error)> =
            response.take_errors().into_iter().collect();
        if errors.is_empty() {
            return Ok(CommitOutcome::Committed);
        }
        if errors.iter().any(|(_, e)| is_conflict(&e.to_string())) {
            return Ok(Self::conflict(batch, "version"));
        }

        // 失败语句之外的错误都只是回滚的连带结果
        errors.sort_by_key(|(index, _)| *index);
        let cause = errors
            .iter()
            .position(|(_, e)| !e.to_string().contains(NOT_EXECUTED_MARKER))
            .unwrap_or(0);
        Err(errors.swap_remove(cause).1.into())
    }

    async fn get_cohort(&self, key: &CohortKey) -> Result<Option<CohortStatistic>> {
        Ok(self.read_cohort(key).await?.map(|v| v.record))
    }

    async fn trend_points(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<TrendPoint>> {
        let query = "
            SELECT * OMIT id FROM type::table($table)
            WHERE date >= $from AND date <= $to
            ORDER BY date ASC
        ";
        let points: Vec<TrendPoint> = self
            .pool
            .client()
            .query(query)
            .bind(("table", collections::TRENDS))
            .bind(("from", from.format("%Y-%m-%d").to_string()))
            .bind(("to", to.format("%Y-%m-%d").to_string()))
            .await?
            .take(0)?;
        Ok(points)
    }

    async fn put_trend_point(&self, point: &TrendPoint) -> Result<()> {
        self.pool
            .client()
            .query("UPSERT type::thing($table, $key) CONTENT $point_doc")
            .bind(("table", collections::TRENDS))
            .bind(("key", point.storage_key()))
            .bind(("point_doc", serde_json::to_value(point)?))
            .await?
            .check()?;
        Ok(())
    }

    async fn get_daily_aggregate(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAggregate>> {
        let result: Option<DailyAggregate> = self
            .pool
            .client()
            .select((
                collections::DAILY_AGGREGATES,
                DailyAggregate::storage_key(user_id, date),
            ))
            .await?;
        Ok(result)
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let query = "SELECT * OMIT id FROM type::table($table) WHERE userId = $user_id";
        let mut records: Vec<SessionRecord> = self
            .pool
            .client()
            .query(query)
            .bind(("table", collections::SESSIONS))
            .bind(("user_id", user_id.to_string()))
            .await?
            .take(0)?;
        // createdAt 以字符串存储，小数位数不定，按时间值排序
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn health_check(&self) -> Result<()> {
        self.pool.client().health().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config::StorageBackend;
    use crate::models::daily_aggregate::DayType;
    use crate::models::session::SleepSession;
    use chrono::TimeZone;
    use std::sync::Arc;

    async fn store() -> SurrealStore {
        let config = DatabaseConfig {
            backend: StorageBackend::Surrealdb,
            url: "mem://".into(),
            namespace: "hypnos".into(),
            database: "test".into(),
            connection_timeout: 5,
            ..Default::default()
        };
        SurrealStore::new(SurrealPool::new(&config).await.unwrap())
    }

    fn batch(user: &str, cohort: Option<CohortWrite>) -> UploadBatch {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 23, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 2, 6, 30, 0).unwrap();
        let session = SleepSession {
            start_time: start,
            end_time: end,
            duration: 450.0,
            quality_score: 80.0,
            movements: None,
        };
        UploadBatch {
            daily: DailyAggregate {
                user_id: user.to_string(),
                date: start.date_naive(),
                sleep_duration: 450.0,
                sleep_quality: 80.0,
                bedtime: start,
                wake_time: end,
                movement_count: 0,
                day_type: DayType::Weekend,
                created_at: Utc::now(),
            },
            session: SessionRecord::new(user, session),
            cohort,
        }
    }

    fn stat(total: u64, avg: f64) -> CohortStatistic {
        let now = Utc::now();
        CohortStatistic {
            age_group: "20s".into(),
            occupation: "student".into(),
            total_sessions: total,
            avg_duration: avg,
            avg_quality: avg,
            phone_usage_correlation: None,
            created_at: now,
            last_updated: now,
        }
    }

    fn key() -> CohortKey {
        CohortKey::new("20s", "student")
    }

    async fn count(store: &SurrealStore, table: &str) -> usize {
        let users: Vec<String> = store
            .pool
            .client()
            .query("SELECT VALUE userId FROM type::table($table)")
            .bind(("table", table.to_string()))
            .await
            .unwrap()
            .take(0)
            .unwrap();
        users.len()
    }

    #[test]
    fn test_embedded_urls_skip_signin() {
        assert!(is_embedded("mem://"));
        assert!(is_embedded("rocksdb://data/hypnos"));
        assert!(!is_embedded("ws://localhost:8000"));
        assert!(!is_embedded("http://db:8000"));
    }

    #[test]
    fn test_conflict_messages() {
        assert!(is_conflict("An error occurred: cohort_version_conflict"));
        assert!(is_conflict(
            "Failed to commit transaction due to a read or write conflict. This transaction can be retried"
        ));
        assert!(!is_conflict("The query was not executed due to a failed transaction"));
    }

    #[test]
    fn test_cohort_row_carries_version() {
        let record = stat(4, 75.0);
        let versioned = CohortRow::with_version(&record, 9).into_versioned();
        assert_eq!(versioned.version, 9);
        assert_eq!(versioned.record, record);
    }

    #[tokio::test]
    async fn test_commit_round_trip() {
        let store = store().await;
        let first = batch("u1", Some(CohortWrite::Create(stat(1, 60.0))));

        let outcome = store.commit(&first).await.unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);

        let sessions = store.list_sessions("u1").await.unwrap();
        assert_eq!(sessions, vec![first.session.clone()]);

        let daily = store
            .get_daily_aggregate("u1", first.daily.date)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(daily.sleep_duration, 450.0);
        assert_eq!(daily.day_type, DayType::Weekend);

        let read = store.read_cohort(&key()).await.unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.record.total_sessions, 1);

        let second = batch(
            "u2",
            Some(CohortWrite::Update {
                expected_version: 1,
                record: stat(2, 70.0),
            }),
        );
        assert_eq!(store.commit(&second).await.unwrap(), CommitOutcome::Committed);
        let read = store.read_cohort(&key()).await.unwrap().unwrap();
        assert_eq!(read.version, 2);
        assert_eq!(read.record.avg_duration, 70.0);
        assert!(store.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_daily_merge_preserves_foreign_fields() {
        let store = store().await;
        let first = batch("u1", None);
        store
            .pool
            .client()
            .query("CREATE type::thing($table, $key) CONTENT { note: 'from wearable sync', sleepQuality: 1.0 }")
            .bind(("table", collections::DAILY_AGGREGATES))
            .bind(("key", first.daily.key()))
            .await
            .unwrap()
            .check()
            .unwrap();

        store.commit(&first).await.unwrap();

        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Merged {
            note: String,
            sleep_quality: f64,
        }

        let docs: Vec<Merged> = store
            .pool
            .client()
            .query("SELECT note, sleepQuality FROM type::thing($table, $key)")
            .bind(("table", collections::DAILY_AGGREGATES))
            .bind(("key", first.daily.key()))
            .await
            .unwrap()
            .take(0)
            .unwrap();
        assert_eq!(docs[0].note, "from wearable sync");
        assert_eq!(docs[0].sleep_quality, 80.0);
    }

    #[tokio::test]
    async fn test_stale_create_conflicts_without_writing() {
        let store = store().await;
        store
            .commit(&batch("u1", Some(CohortWrite::Create(stat(1, 60.0)))))
            .await
            .unwrap();

        let outcome = store
            .commit(&batch("u2", Some(CohortWrite::Create(stat(1, 90.0)))))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);

        assert!(store.list_sessions("u2").await.unwrap().is_empty());
        assert_eq!(count(&store, collections::SESSIONS).await, 1);
        assert_eq!(count(&store, collections::DAILY_AGGREGATES).await, 1);
        let read = store.read_cohort(&key()).await.unwrap().unwrap();
        assert_eq!((read.version, read.record.avg_duration), (1, 60.0));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_without_writing() {
        let store = store().await;
        store
            .commit(&batch("u1", Some(CohortWrite::Create(stat(1, 60.0)))))
            .await
            .unwrap();

        let outcome = store
            .commit(&batch(
                "u2",
                Some(CohortWrite::Update {
                    expected_version: 7,
                    record: stat(2, 90.0),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Conflict);

        assert!(store.list_sessions("u2").await.unwrap().is_empty());
        let read = store.read_cohort(&key()).await.unwrap().unwrap();
        assert_eq!((read.version, read.record.total_sessions), (1, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_commit_exactly_once() {
        const WRITERS: usize = 8;
        let store = Arc::new(store().await);
        store
            .commit(&batch("seed", Some(CohortWrite::Create(stat(1, 60.0)))))
            .await
            .unwrap();

        let handles: Vec<_> = (0..WRITERS)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .commit(&batch(
                            &format!("w{}", i),
                            Some(CohortWrite::Update {
                                expected_version: 1,
                                record: stat(2, 60.0 + i as f64),
                            }),
                        ))
                        .await
                })
            })
            .collect();

        let mut committed = 0;
        for handle in handles {
            match handle.await.unwrap().unwrap() {
                CommitOutcome::Committed => committed += 1,
                CommitOutcome::Conflict => {}
            }
        }
        assert_eq!(committed, 1);

        let read = store.read_cohort(&key()).await.unwrap().unwrap();
        assert_eq!((read.version, read.record.total_sessions), (2, 2));
        assert_eq!(count(&store, collections::SESSIONS).await, 2);
    }

    #[tokio::test]
    async fn test_trend_window_is_inclusive_and_ordered() {
        let store = store().await;
        for day in [5, 1, 3, 9] {
            let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
            store
                .put_trend_point(&TrendPoint::new(date, Some(400.0), Some(70.0 + day as f64)))
                .await
                .unwrap();
        }

        let points = store
            .trend_points(
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(),
            )
            .await
            .unwrap();
        let days: Vec<u32> = points.iter().map(|p| chrono::Datelike::day(&p.date)).collect();
        assert_eq!(days, vec![1, 3, 5]);
        assert_eq!(points[2].avg_quality, Some(75.0));
        assert!(points[0].extra.is_empty());
    }
}
