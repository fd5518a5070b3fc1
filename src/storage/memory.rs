//! In-memory document store.
//!
//! Collections of versioned JSON documents behind a single `parking_lot::RwLock`.
//! A commit validates the optimistic read, stages every write, and only applies
//! them once the whole batch has been staged, so a failed commit leaves no trace.
//! Suitable for development and tests.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{AppError, Result};
use crate::models::cohort::{CohortKey, CohortStatistic};
use crate::models::daily_aggregate::DailyAggregate;
use crate::models::session::SessionRecord;
use crate::models::trend::TrendPoint;
use crate::storage::store::{
    CohortWrite, CommitOutcome, SleepStore, UploadBatch, Versioned, collections,
};

#[derive(Debug, Clone)]
struct Document {
    version: u64,
    body: serde_json::Value,
}

type Collection = BTreeMap<String, Document>;

/// Point inside a commit where an injected fault fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStage {
    /// After the session insert has been staged.
    AfterSessionInsert,
    /// After the daily aggregate merge has been staged.
    AfterDailyUpsert,
    /// After the cohort write has been staged, right before applying.
    BeforeApply,
}

/// A staged write: (collection, key, new document).
type StagedWrite = (&'static str, String, Document);

/// In-memory [`SleepStore`].
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<BTreeMap<&'static str, Collection>>>,
    fault: Arc<Mutex<Option<CommitStage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail at `stage` with a database error.
    pub fn inject_fault(&self, stage: CommitStage) {
        *self.fault.lock() = Some(stage);
    }

    /// Number of documents in a collection.
    pub fn count(&self, collection: &str) -> usize {
        self.tables.read().get(collection).map_or(0, |c| c.len())
    }

    /// Raw document body, including fields this service does not model.
    pub fn document(&self, collection: &str, key: &str) -> Option<serde_json::Value> {
        self.tables
            .read()
            .get(collection)
            .and_then(|c| c.get(key))
            .map(|d| d.body.clone())
    }

    /// Write a raw document, bypassing the commit path. Used to seed fixtures
    /// that other writers would have produced.
    pub fn seed_document(&self, collection: &'static str, key: &str, body: serde_json::Value) {
        let mut tables = self.tables.write();
        let coll = tables.entry(collection).or_default();
        let version = coll.get(key).map_or(1, |d| d.version + 1);
        coll.insert(key.to_string(), Document { version, body });
    }

    fn current(&self, collection: &str, key: &str) -> Option<Document> {
        self.tables
            .read()
            .get(collection)
            .and_then(|c| c.get(key))
            .cloned()
    }

    fn check_fault(&self, stage: CommitStage) -> Result<()> {
        let mut fault = self.fault.lock();
        if *fault == Some(stage) {
            *fault = None;
            return Err(AppError::Database(format!("injected fault at {:?}", stage)));
        }
        Ok(())
    }
}

fn lookup<'a>(
    tables: &'a BTreeMap<&'static str, Collection>,
    collection: &str,
    key: &str,
) -> Option<&'a Document> {
    tables.get(collection).and_then(|c| c.get(key))
}

fn to_document<T: Serialize>(value: &T) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

fn from_document<T: DeserializeOwned>(doc: &Document) -> Result<T> {
    Ok(serde_json::from_value(doc.body.clone())?)
}

/// Field-level merge: incoming fields overwrite, other existing fields survive.
fn merge_fields(existing: Option<&Document>, incoming: serde_json::Value) -> Document {
    match existing {
        Some(doc) => {
            let body = match (doc.body.clone(), incoming) {
                (serde_json::Value::Object(mut target), serde_json::Value::Object(fields)) => {
                    target.extend(fields);
                    serde_json::Value::Object(target)
                }
                (_, incoming) => incoming,
            };
            Document {
                version: doc.version + 1,
                body,
            }
        }
        None => Document {
            version: 1,
            body: incoming,
        },
    }
}

#[async_trait]
impl SleepStore for MemoryStore {
    async fn read_cohort(&self, key: &CohortKey) -> Result<Option<Versioned<CohortStatistic>>> {
        match self.current(collections::COHORT_STATS, &key.to_string()) {
            Some(doc) => Ok(Some(Versioned {
                version: doc.version,
                record: from_document(&doc)?,
            })),
            None => Ok(None),
        }
    }

    async fn commit(&self, batch: &UploadBatch) -> Result<CommitOutcome> {
        let session_body = to_document(&batch.session)?;
        let daily_body = to_document(&batch.daily)?;
        let cohort_body = batch
            .cohort
            .as_ref()
            .map(|w| to_document(w.record()))
            .transpose()?;

        let mut tables = self.tables.write();

        // Optimistic check before anything is staged.
        if let Some(write) = &batch.cohort {
            let current = lookup(&tables, collections::COHORT_STATS, &write.key().to_string())
                .map(|d| d.version);
            let stale = match (write, current) {
                (CohortWrite::Create(_), None) => false,
                (CohortWrite::Create(_), Some(_)) => true,
                (CohortWrite::Update { expected_version, .. }, Some(v)) => v != *expected_version,
                (CohortWrite::Update { .. }, None) => true,
            };
            if stale {
                return Ok(CommitOutcome::Conflict);
            }
        }

        let mut staged: Vec<StagedWrite> = Vec::with_capacity(3);

        let session_key = batch.session.storage_key();
        if lookup(&tables, collections::SESSIONS, &session_key).is_some() {
            return Err(AppError::Database(format!(
                "session already exists: {}",
                session_key
            )));
        }
        staged.push((
            collections::SESSIONS,
            session_key,
            Document {
                version: 1,
                body: session_body,
            },
        ));
        self.check_fault(CommitStage::AfterSessionInsert)?;

        let daily_key = batch.daily.key();
        let merged = merge_fields(
            lookup(&tables, collections::DAILY_AGGREGATES, &daily_key),
            daily_body,
        );
        staged.push((collections::DAILY_AGGREGATES, daily_key, merged));
        self.check_fault(CommitStage::AfterDailyUpsert)?;

        if let (Some(write), Some(body)) = (&batch.cohort, cohort_body) {
            let key = write.key().to_string();
            let version =
                lookup(&tables, collections::COHORT_STATS, &key).map_or(1, |d| d.version + 1);
            staged.push((collections::COHORT_STATS, key, Document { version, body }));
        }
        self.check_fault(CommitStage::BeforeApply)?;

        for (collection, key, doc) in staged {
            tables.entry(collection).or_default().insert(key, doc);
        }
        Ok(CommitOutcome::Committed)
    }

    async fn get_cohort(&self, key: &CohortKey) -> Result<Option<CohortStatistic>> {
        self.current(collections::COHORT_STATS, &key.to_string())
            .map(|doc| from_document(&doc))
            .transpose()
    }

    async fn trend_points(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<TrendPoint>> {
        if from > to {
            return Ok(Vec::new());
        }
        let tables = self.tables.read();
        let Some(trends) = tables.get(collections::TRENDS) else {
            return Ok(Vec::new());
        };
        // ISO dates sort lexicographically in calendar order.
        let lower = from.format("%Y-%m-%d").to_string();
        let upper = to.format("%Y-%m-%d").to_string();
        trends
            .range::<String, _>((Bound::Included(&lower), Bound::Included(&upper)))
            .map(|(_, doc)| from_document(doc))
            .collect()
    }

    async fn put_trend_point(&self, point: &TrendPoint) -> Result<()> {
        let body = to_document(point)?;
        let mut tables = self.tables.write();
        let coll = tables.entry(collections::TRENDS).or_default();
        let key = point.storage_key();
        let version = coll.get(&key).map_or(1, |d| d.version + 1);
        coll.insert(key, Document { version, body });
        Ok(())
    }

    async fn get_daily_aggregate(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<Option<DailyAggregate>> {
        self.current(
            collections::DAILY_AGGREGATES,
            &DailyAggregate::storage_key(user_id, date),
        )
        .map(|doc| from_document(&doc))
        .transpose()
    }

    async fn list_sessions(&self, user_id: &str) -> Result<Vec<SessionRecord>> {
        let prefix = format!("{}/", user_id);
        let tables = self.tables.read();
        let Some(sessions) = tables.get(collections::SESSIONS) else {
            return Ok(Vec::new());
        };
        let mut records = sessions
            .range::<String, _>((Bound::Included(&prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(&prefix))
            .map(|(_, doc)| from_document::<SessionRecord>(doc))
            .collect::<Result<Vec<_>>>()?;
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::daily_aggregate::DayType;
    use crate::models::session::SleepSession;
    use chrono::{TimeZone, Utc};

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
            age_group: "30s".into(),
            occupation: "engineer".into(),
            total_sessions: total,
            avg_duration: avg,
            avg_quality: avg,
            phone_usage_correlation: None,
            created_at: now,
            last_updated: now,
        }
    }

    #[tokio::test]
    async fn test_commit_writes_all_records() {
        let store = MemoryStore::new();
        let outcome = store
            .commit(&batch("u1", Some(CohortWrite::Create(stat(1, 10.0)))))
            .await
            .unwrap();
        assert_eq!(outcome, CommitOutcome::Committed);
        assert_eq!(store.count(collections::SESSIONS), 1);
        assert_eq!(store.count(collections::DAILY_AGGREGATES), 1);

        let read = store
            .read_cohort(&CohortKey::new("30s", "engineer"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(read.record.total_sessions, 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts_without_writing() {
        let store = MemoryStore::new();
        store
            .commit(&batch("u1", Some(CohortWrite::Create(stat(1, 10.0)))))
            .await
            .unwrap();

        let second_create = store
            .commit(&batch("u2", Some(CohortWrite::Create(stat(1, 20.0)))))
            .await
            .unwrap();
        assert_eq!(second_create, CommitOutcome::Conflict);

        let stale_update = store
            .commit(&batch(
                "u3",
                Some(CohortWrite::Update {
                    expected_version: 7,
                    record: stat(2, 15.0),
                }),
            ))
            .await
            .unwrap();
        assert_eq!(stale_update, CommitOutcome::Conflict);

        assert_eq!(store.count(collections::SESSIONS), 1);
        assert!(store.list_sessions("u2").await.unwrap().is_empty());
        assert!(store.list_sessions("u3").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_injected_fault_leaves_nothing_behind() {
        for stage in [
            CommitStage::AfterSessionInsert,
            CommitStage::AfterDailyUpsert,
            CommitStage::BeforeApply,
        ] {
            let store = MemoryStore::new();
            store.inject_fault(stage);
            let result = store
                .commit(&batch("u1", Some(CohortWrite::Create(stat(1, 10.0)))))
                .await;
            assert!(result.is_err());
            assert_eq!(store.count(collections::SESSIONS), 0);
            assert_eq!(store.count(collections::DAILY_AGGREGATES), 0);
            assert_eq!(store.count(collections::COHORT_STATS), 0);
        }
    }

    #[tokio::test]
    async fn test_daily_merge_preserves_foreign_fields() {
        let store = MemoryStore::new();
        let first = batch("u1", None);
        let key = first.daily.key();
        store.seed_document(
            collections::DAILY_AGGREGATES,
            &key,
            serde_json::json!({ "note": "from wearable sync", "sleepQuality": 1.0 }),
        );

        store.commit(&first).await.unwrap();

        let doc = store.document(collections::DAILY_AGGREGATES, &key).unwrap();
        assert_eq!(doc["note"], "from wearable sync");
        assert_eq!(doc["sleepQuality"], 80.0);
    }

    #[tokio::test]
    async fn test_trend_range_is_inclusive_and_ordered() {
        let store = MemoryStore::new();
        for day in [5, 1, 3, 9] {
            let date = NaiveDate::from_ymd_opt(2024, 3, day).unwrap();
            store
                .put_trend_point(&TrendPoint::new(date, Some(400.0), Some(70.0)))
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
    }
}
