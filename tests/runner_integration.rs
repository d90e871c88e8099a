//! Background Runner Integration Tests
//!
//! Submission rules, completion signalling, per-farm serialisation and
//! graceful shutdown of the pipeline runner.

use chrono::{DateTime, Duration, TimeZone, Utc};
use mdi_predictor::ml_engine::FeatureMatrix;
use mdi_predictor::{
    AppContext, IngestionTrigger, InMemoryStore, ManualClock, MdiRegressor, MilkingSession,
    ModelError, PipelineRunner, PredictorConfig, RunHandle, RunOutcome, SkipReason, VoluntarySessionMetrics,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FARM: &str = "farm-north";

struct FixedModel(f64);

impl MdiRegressor for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        Ok(vec![self.0; features.n_rows()])
    }
}

/// Blocks inside `predict` and records the highest number of overlapping calls.
#[derive(Default)]
struct SlowModel {
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl MdiRegressor for SlowModel {
    fn name(&self) -> &str {
        "slow"
    }

    fn predict(&self, features: &FeatureMatrix) -> Result<Vec<f64>, ModelError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(50));
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![0.5; features.n_rows()])
    }
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
}

fn seeded_store(sessions: i64) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    for oid in 1..=sessions {
        store.add_sessions(
            FARM,
            vec![MilkingSession::new(oid, Some(7), now() - Duration::hours(oid))],
        );
        store.add_voluntary_metrics(
            FARM,
            vec![VoluntarySessionMetrics {
                mdi: Some(1.0),
                ..VoluntarySessionMetrics::new(oid)
            }],
        );
    }
    store
}

fn runner(
    store: &Arc<InMemoryStore>,
    model: Option<Arc<dyn MdiRegressor>>,
    config: PredictorConfig,
) -> PipelineRunner {
    let clock = Arc::new(ManualClock::new(now()));
    PipelineRunner::new(Arc::new(AppContext::new(config, store.clone(), model, clock)))
}

#[tokio::test]
async fn empty_trigger_is_not_submitted() {
    let store = seeded_store(3);
    let runner = runner(&store, Some(Arc::new(FixedModel(1.0))), PredictorConfig::default());

    assert!(runner.submit(IngestionTrigger::new(FARM, vec![])).is_none());
    runner.shutdown().await;

    let stats = runner.stats();
    assert_eq!(stats.submitted, 0);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.pipeline.runs, 0);
    assert!(store.call_log().session_cutoffs.is_empty());
}

#[tokio::test]
async fn trigger_without_model_is_not_submitted() {
    let store = seeded_store(3);
    let runner = runner(&store, None, PredictorConfig::default());

    assert!(runner.submit(IngestionTrigger::new(FARM, vec![1, 2])).is_none());
    runner.shutdown().await;

    assert_eq!(runner.stats().pipeline.runs, 0);
    assert_eq!(store.call_log().insert_batches, 0);
}

#[tokio::test]
async fn handle_reports_outcome() {
    let store = seeded_store(3);
    let runner = runner(&store, Some(Arc::new(FixedModel(1.0))), PredictorConfig::default());

    let handle = runner
        .submit(IngestionTrigger::new(FARM, vec![1, 2]))
        .expect("run submitted");
    assert_eq!(handle.farm_id(), FARM);
    assert_eq!(handle.outcome().await.expect("outcome"), RunOutcome::Persisted { rows: 2 });

    let handle = runner
        .submit(IngestionTrigger::new(FARM, vec![99]))
        .expect("run submitted");
    assert_eq!(
        handle.outcome().await.expect("outcome"),
        RunOutcome::Skipped(SkipReason::NoNewRowsAfterFilter)
    );

    runner.shutdown().await;
    let stats = runner.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.pipeline.runs_persisted, 1);
    assert_eq!(stats.pipeline.runs_skipped, 1);
}

#[tokio::test]
async fn dropped_handle_still_completes_before_shutdown() {
    let store = seeded_store(2);
    let runner = runner(&store, Some(Arc::new(FixedModel(1.0))), PredictorConfig::default());

    drop(runner.submit(IngestionTrigger::new(FARM, vec![1])));
    runner.shutdown().await;

    assert_eq!(runner.in_flight(), 0);
    assert_eq!(store.predictions().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn runs_for_same_farm_are_serialized() {
    let store = seeded_store(4);
    let model = Arc::new(SlowModel::default());
    let runner = runner(&store, Some(model.clone()), PredictorConfig::default());

    let handles: Vec<_> = (1..=4)
        .map(|oid| {
            runner
                .submit(IngestionTrigger::new(FARM, vec![oid]))
                .expect("run submitted")
        })
        .collect();
    let outcomes = futures::future::join_all(handles.into_iter().map(RunHandle::outcome)).await;
    for outcome in outcomes {
        assert_eq!(outcome.expect("outcome"), RunOutcome::Persisted { rows: 1 });
    }
    runner.shutdown().await;

    assert_eq!(model.max_active.load(Ordering::SeqCst), 1);
    assert_eq!(store.call_log().insert_batches, 4);
}
