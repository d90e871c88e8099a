//! Prediction Pipeline - post-ingestion scoring sequence
//!
//! ```text
//! STAGE 1: Context Window   (recent window, else fixed fallback window)
//! STAGE 2: Join & Features  (inner join, per-animal rolling means 15/21)
//! STAGE 3: Lactation        (highest lactation number, days-in-milk)
//! STAGE 4: Inference        (new sessions only, model + logistic probability)
//! STAGE 5: Persistence      (sanitize non-finite values, one batch insert)
//! ```
//!
//! Every stage can end the run early without output. Those exits are
//! reported as [`RunOutcome::Skipped`], not errors. Store and model failures
//! abort the run and surface as [`PipelineError`]; nothing is retried.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use super::context_window::ContextWindowFetcher;
use super::features::FeatureEngine;
use super::inference;
use super::lactation::LactationEnricher;
use super::writer::PersistenceWriter;
use crate::clock::Clock;
use crate::config::PredictorConfig;
use crate::ml_engine::{ConfigCache, MdiRegressor, ModelError};
use crate::storage::{PredictionStore, StoreError};
use crate::types::SessionOid;

/// Why a run ended without writing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The trigger carried no session ids
    NoNewSessions,
    /// No regression model is loaded
    NoModel,
    /// Neither the recent nor the fallback window has sessions
    NoContextData,
    /// No session in the window has matching voluntary metrics
    EmptyJoin,
    /// None of the new sessions survived the join
    NoNewRowsAfterFilter,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SkipReason::NoNewSessions => "no new sessions",
            SkipReason::NoModel => "no model loaded",
            SkipReason::NoContextData => "no session data in recent or fallback window",
            SkipReason::EmptyJoin => "join of sessions and voluntary metrics is empty",
            SkipReason::NoNewRowsAfterFilter => "no new sessions left after feature computation",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Persisted { rows: usize },
    Skipped(SkipReason),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("context window fetch failed: {0}")]
    Fetch(#[source] StoreError),
    #[error("lactation summary fetch failed: {0}")]
    Lactation(#[source] StoreError),
    #[error("inference failed: {0}")]
    Inference(#[source] ModelError),
    #[error("persisting predictions failed: {0}")]
    Persist(#[source] StoreError),
    /// The background task ended (panicked or was dropped) before reporting
    #[error("pipeline task ended without reporting an outcome")]
    TaskLost,
}

/// Runs the five stages for one farm and one ingestion batch.
pub struct PredictionPipeline {
    store: Arc<dyn PredictionStore>,
    config_cache: Arc<ConfigCache>,
    clock: Arc<dyn Clock>,
    fetcher: ContextWindowFetcher,
    features: FeatureEngine,
    /// Statistics
    runs: AtomicU64,
    runs_persisted: AtomicU64,
    runs_skipped: AtomicU64,
    runs_failed: AtomicU64,
    rows_persisted: AtomicU64,
}

impl PredictionPipeline {
    pub fn new(
        store: Arc<dyn PredictionStore>,
        config_cache: Arc<ConfigCache>,
        clock: Arc<dyn Clock>,
        config: &PredictorConfig,
    ) -> Self {
        Self {
            store,
            config_cache,
            clock,
            fetcher: ContextWindowFetcher::new(config.window.clone()),
            features: FeatureEngine::new(&config.features),
            runs: AtomicU64::new(0),
            runs_persisted: AtomicU64::new(0),
            runs_skipped: AtomicU64::new(0),
            runs_failed: AtomicU64::new(0),
            rows_persisted: AtomicU64::new(0),
        }
    }

    pub fn fetcher(&self) -> &ContextWindowFetcher {
        &self.fetcher
    }

    /// Score the sessions in `new_oids` for `farm_id` and persist the results.
    pub async fn run(
        &self,
        farm_id: &str,
        model: Option<&dyn MdiRegressor>,
        new_oids: &[SessionOid],
    ) -> Result<RunOutcome, PipelineError> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        let result = self.run_stages(farm_id, model, new_oids).await;

        match &result {
            Ok(RunOutcome::Persisted { rows }) => {
                self.runs_persisted.fetch_add(1, Ordering::Relaxed);
                self.rows_persisted.fetch_add(*rows as u64, Ordering::Relaxed);
            }
            Ok(RunOutcome::Skipped(reason)) => {
                self.runs_skipped.fetch_add(1, Ordering::Relaxed);
                info!(farm_id, %reason, "Prediction run skipped");
            }
            Err(e) => {
                self.runs_failed.fetch_add(1, Ordering::Relaxed);
                warn!(farm_id, error = %e, "Prediction run aborted");
            }
        }
        result
    }

    async fn run_stages(
        &self,
        farm_id: &str,
        model: Option<&dyn MdiRegressor>,
        new_oids: &[SessionOid],
    ) -> Result<RunOutcome, PipelineError> {
        if new_oids.is_empty() {
            return Ok(RunOutcome::Skipped(SkipReason::NoNewSessions));
        }
        let Some(model) = model else {
            return Ok(RunOutcome::Skipped(SkipReason::NoModel));
        };

        info!(
            farm_id,
            new_sessions = new_oids.len(),
            model = model.name(),
            "Starting MDI prediction"
        );

        // STAGE 1: Context window
        let now = self.clock.now();
        let Some(window) = self
            .fetcher
            .fetch(self.store.as_ref(), farm_id, now)
            .await
            .map_err(PipelineError::Fetch)?
        else {
            return Ok(RunOutcome::Skipped(SkipReason::NoContextData));
        };

        // STAGE 2: Join & rolling features
        let mut rows = self.features.build(window.sessions, window.metrics);
        info!(farm_id, rows = rows.len(), "Rows after inner join");
        if rows.is_empty() {
            return Ok(RunOutcome::Skipped(SkipReason::EmptyJoin));
        }

        // STAGE 3: Lactation context
        let lactations = self
            .store
            .lactation_summaries(farm_id)
            .await
            .map_err(PipelineError::Lactation)?;
        LactationEnricher::enrich(&mut rows, &lactations);

        // STAGE 4: Inference on the new sessions only
        let new_rows = inference::select_new(rows, new_oids);
        if new_rows.is_empty() {
            return Ok(RunOutcome::Skipped(SkipReason::NoNewRowsAfterFilter));
        }
        let coefficients = self.config_cache.get_config().await;
        let scored = inference::score(new_rows, model, &coefficients)
            .map_err(PipelineError::Inference)?;

        // STAGE 5: Persistence
        let records = PersistenceWriter::records(farm_id, &scored);
        let rows = PersistenceWriter::write(self.store.as_ref(), &records)
            .await
            .map_err(PipelineError::Persist)?;

        Ok(RunOutcome::Persisted { rows })
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            runs: self.runs.load(Ordering::Relaxed),
            runs_persisted: self.runs_persisted.load(Ordering::Relaxed),
            runs_skipped: self.runs_skipped.load(Ordering::Relaxed),
            runs_failed: self.runs_failed.load(Ordering::Relaxed),
            rows_persisted: self.rows_persisted.load(Ordering::Relaxed),
        }
    }
}

/// Pipeline statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub runs: u64,
    pub runs_persisted: u64,
    pub runs_skipped: u64,
    pub runs_failed: u64,
    pub rows_persisted: u64,
}

impl std::fmt::Display for PipelineStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Pipeline: {} runs ({} persisted, {} skipped, {} failed), {} predictions",
            self.runs,
            self.runs_persisted,
            self.runs_skipped,
            self.runs_failed,
            self.rows_persisted
        )
    }
}
