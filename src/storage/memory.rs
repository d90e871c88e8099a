//! In-memory store for tests, demos and offline replays
//!
//! Thread-safe via `RwLock`. Not durable: data is lost on drop. Every query
//! is recorded in a [`CallLog`] so callers can assert which context windows
//! were requested and how many batches were written.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::persistence::{PredictionStore, StoreError};
use super::tables;
use crate::types::{
    LactationSummary, MilkingSession, ModelConfig, PredictionRecord, SessionOid,
    VoluntarySessionMetrics,
};

#[derive(Debug, Default)]
struct FarmTables {
    sessions: Vec<MilkingSession>,
    voluntary: Vec<VoluntarySessionMetrics>,
    lactations: Vec<LactationSummary>,
}

/// Record of the queries issued against an [`InMemoryStore`].
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    /// `since` argument of every `recent_sessions` call, in call order
    pub session_cutoffs: Vec<DateTime<Utc>>,
    pub voluntary_lookups: usize,
    pub lactation_lookups: usize,
    pub config_fetches: usize,
    pub insert_batches: usize,
}

/// Query that can be made to fail on purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Sessions,
    Lactations,
    ModelConfig,
    Insert,
}

pub struct InMemoryStore {
    farms: RwLock<BTreeMap<String, FarmTables>>,
    model_configs: RwLock<Vec<ModelConfig>>,
    predictions: RwLock<Vec<PredictionRecord>>,
    calls: RwLock<CallLog>,
    fail_sessions: AtomicBool,
    fail_lactations: AtomicBool,
    fail_model_config: AtomicBool,
    fail_insert: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            farms: RwLock::new(BTreeMap::new()),
            model_configs: RwLock::new(Vec::new()),
            predictions: RwLock::new(Vec::new()),
            calls: RwLock::new(CallLog::default()),
            fail_sessions: AtomicBool::new(false),
            fail_lactations: AtomicBool::new(false),
            fail_model_config: AtomicBool::new(false),
            fail_insert: AtomicBool::new(false),
        }
    }

    pub fn add_sessions(&self, farm_id: &str, sessions: impl IntoIterator<Item = MilkingSession>) {
        self.with_farm(farm_id, |t| t.sessions.extend(sessions));
    }

    pub fn add_voluntary_metrics(
        &self,
        farm_id: &str,
        metrics: impl IntoIterator<Item = VoluntarySessionMetrics>,
    ) {
        self.with_farm(farm_id, |t| t.voluntary.extend(metrics));
    }

    pub fn add_lactations(
        &self,
        farm_id: &str,
        lactations: impl IntoIterator<Item = LactationSummary>,
    ) {
        self.with_farm(farm_id, |t| t.lactations.extend(lactations));
    }

    pub fn add_model_config(&self, config: ModelConfig) {
        write(&self.model_configs).push(config);
    }

    /// Every record inserted so far, in insertion order.
    pub fn predictions(&self) -> Vec<PredictionRecord> {
        read(&self.predictions).clone()
    }

    pub fn call_log(&self) -> CallLog {
        read(&self.calls).clone()
    }

    /// Make the given query fail (or succeed again) from now on.
    pub fn set_failure(&self, point: FailurePoint, fail: bool) {
        let flag = match point {
            FailurePoint::Sessions => &self.fail_sessions,
            FailurePoint::Lactations => &self.fail_lactations,
            FailurePoint::ModelConfig => &self.fail_model_config,
            FailurePoint::Insert => &self.fail_insert,
        };
        flag.store(fail, Ordering::SeqCst);
    }

    fn with_farm(&self, farm_id: &str, f: impl FnOnce(&mut FarmTables)) {
        let mut farms = write(&self.farms);
        f(farms.entry(farm_id.to_string()).or_default());
    }

    fn record(&self, f: impl FnOnce(&mut CallLog)) {
        f(&mut write(&self.calls));
    }

    fn check(flag: &AtomicBool, table: &'static str) -> Result<(), StoreError> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Query {
                table,
                message: "injected failure".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(std::sync::PoisonError::into_inner)
}

#[async_trait]
impl PredictionStore for InMemoryStore {
    async fn recent_sessions(
        &self,
        farm_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MilkingSession>, StoreError> {
        self.record(|c| c.session_cutoffs.push(since));
        Self::check(&self.fail_sessions, tables::SESSIONS)?;

        Ok(read(&self.farms)
            .get(farm_id)
            .map(|t| {
                t.sessions
                    .iter()
                    .filter(|s| s.begin_time >= since)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn voluntary_metrics_by_ids(
        &self,
        farm_id: &str,
        oids: &[SessionOid],
    ) -> Result<Vec<VoluntarySessionMetrics>, StoreError> {
        self.record(|c| c.voluntary_lookups += 1);
        Self::check(&self.fail_sessions, tables::VOLUNTARY_SESSIONS)?;

        let wanted: HashSet<SessionOid> = oids.iter().copied().collect();
        Ok(read(&self.farms)
            .get(farm_id)
            .map(|t| {
                t.voluntary
                    .iter()
                    .filter(|v| wanted.contains(&v.oid))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn lactation_summaries(
        &self,
        farm_id: &str,
    ) -> Result<Vec<LactationSummary>, StoreError> {
        self.record(|c| c.lactation_lookups += 1);
        Self::check(&self.fail_lactations, tables::LACTATIONS)?;

        Ok(read(&self.farms)
            .get(farm_id)
            .map(|t| t.lactations.clone())
            .unwrap_or_default())
    }

    async fn latest_model_config(&self) -> Result<Option<ModelConfig>, StoreError> {
        self.record(|c| c.config_fetches += 1);
        Self::check(&self.fail_model_config, tables::MODEL_CONFIG)?;

        Ok(read(&self.model_configs)
            .iter()
            .max_by_key(|c| c.updated_at)
            .copied())
    }

    async fn insert_predictions(&self, records: &[PredictionRecord]) -> Result<(), StoreError> {
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Insert {
                table: tables::PREDICTIONS,
                message: "injected failure".to_string(),
            });
        }
        self.record(|c| c.insert_batches += 1);
        write(&self.predictions).extend_from_slice(records);
        Ok(())
    }

    async fn first_farm_id(&self) -> Result<Option<String>, StoreError> {
        Ok(read(&self.farms).keys().next().cloned())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 6, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn test_recent_sessions_filters_by_farm_and_cutoff() {
        let store = InMemoryStore::new();
        store.add_sessions(
            "farm-a",
            vec![
                MilkingSession::new(1, Some(10), t0() - Duration::days(10)),
                MilkingSession::new(2, Some(10), t0()),
            ],
        );
        store.add_sessions("farm-b", vec![MilkingSession::new(3, Some(11), t0())]);

        let rows = store
            .recent_sessions("farm-a", t0() - Duration::days(7))
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].oid, 2);
        assert_eq!(store.call_log().session_cutoffs, vec![t0() - Duration::days(7)]);
    }

    #[tokio::test]
    async fn test_voluntary_lookup_restricted_to_ids() {
        let store = InMemoryStore::new();
        store.add_voluntary_metrics(
            "farm-a",
            (1..=5).map(VoluntarySessionMetrics::new),
        );

        let rows = store.voluntary_metrics_by_ids("farm-a", &[2, 4, 9]).await.unwrap();
        let oids: Vec<_> = rows.iter().map(|r| r.oid).collect();
        assert_eq!(oids, vec![2, 4]);
    }

    #[tokio::test]
    async fn test_latest_model_config_picks_most_recent_update() {
        let store = InMemoryStore::new();
        assert!(store.latest_model_config().await.unwrap().is_none());

        let mut older = ModelConfig::new(-1.0, 1.0, 1.0);
        older.updated_at = Some(t0());
        let mut newer = ModelConfig::new(-2.0, 2.0, 2.0);
        newer.updated_at = Some(t0() + Duration::hours(1));
        store.add_model_config(newer);
        store.add_model_config(older);

        let latest = store.latest_model_config().await.unwrap().unwrap();
        assert!((latest.intercept + 2.0).abs() < f64::EPSILON);
        assert_eq!(store.call_log().config_fetches, 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = InMemoryStore::new();
        store.set_failure(FailurePoint::ModelConfig, true);
        assert!(store.latest_model_config().await.is_err());
        store.set_failure(FailurePoint::ModelConfig, false);
        assert!(store.latest_model_config().await.is_ok());

        store.set_failure(FailurePoint::Insert, true);
        assert!(store.insert_predictions(&[]).await.is_err());
        assert_eq!(store.call_log().insert_batches, 0);
    }

    #[tokio::test]
    async fn test_trait_object() {
        let store: Box<dyn PredictionStore> = Box::new(InMemoryStore::new());
        assert_eq!(store.backend_name(), "InMemory");
        assert!(store.first_farm_id().await.unwrap().is_none());
    }
}
