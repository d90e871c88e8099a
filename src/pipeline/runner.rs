//! Background Runner
//!
//! Ingestion hands each batch of newly persisted sessions to
//! [`PipelineRunner::submit`], which returns immediately. The run happens on
//! a tracked Tokio task; the returned [`RunHandle`] can be awaited for the
//! outcome or simply dropped.
//!
//! With `runner.serialize_per_farm` set, runs for the same farm hold a
//! per-farm lock so two batches never interleave their fetch and insert.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use tokio::sync::{oneshot, Mutex};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::coordinator::{PipelineError, PipelineStats, RunOutcome};
use super::state::AppContext;
use crate::types::SessionOid;

/// A batch of sessions just persisted by ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionTrigger {
    pub farm_id: String,
    pub new_session_oids: Vec<SessionOid>,
}

impl IngestionTrigger {
    pub fn new(farm_id: impl Into<String>, new_session_oids: Vec<SessionOid>) -> Self {
        Self {
            farm_id: farm_id.into(),
            new_session_oids,
        }
    }
}

/// Completion signal of one submitted run.
#[derive(Debug)]
pub struct RunHandle {
    farm_id: String,
    rx: oneshot::Receiver<Result<RunOutcome, PipelineError>>,
}

impl RunHandle {
    pub fn farm_id(&self) -> &str {
        &self.farm_id
    }

    /// Wait for the run to finish.
    pub async fn outcome(self) -> Result<RunOutcome, PipelineError> {
        self.rx.await.unwrap_or(Err(PipelineError::TaskLost))
    }
}

pub struct PipelineRunner {
    context: Arc<AppContext>,
    tracker: TaskTracker,
    farm_locks: std::sync::Mutex<HashMap<String, Arc<Mutex<()>>>>,
    submitted: AtomicU64,
    ignored: AtomicU64,
}

impl PipelineRunner {
    pub fn new(context: Arc<AppContext>) -> Self {
        Self {
            context,
            tracker: TaskTracker::new(),
            farm_locks: std::sync::Mutex::new(HashMap::new()),
            submitted: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.context
    }

    /// Schedule a run for `trigger` without waiting for it.
    ///
    /// Returns `None`, and starts nothing, when the trigger has no sessions
    /// or no model is loaded. Must be called from within a Tokio runtime.
    pub fn submit(&self, trigger: IngestionTrigger) -> Option<RunHandle> {
        if trigger.new_session_oids.is_empty() {
            debug!(farm_id = %trigger.farm_id, "Ignoring trigger without new sessions");
            self.ignored.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        if self.context.model.is_none() {
            warn!(
                farm_id = %trigger.farm_id,
                new_sessions = trigger.new_session_oids.len(),
                "No model loaded, skipping prediction"
            );
            self.ignored.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let lock = self
            .context
            .config
            .runner
            .serialize_per_farm
            .then(|| self.farm_lock(&trigger.farm_id));
        let (tx, rx) = oneshot::channel();
        let context = self.context.clone();
        let IngestionTrigger {
            farm_id,
            new_session_oids,
        } = trigger;
        let handle_farm = farm_id.clone();

        self.submitted.fetch_add(1, Ordering::Relaxed);
        self.tracker.spawn(async move {
            let _guard = match &lock {
                Some(lock) => Some(lock.lock().await),
                None => None,
            };

            let result = context
                .pipeline
                .run(&farm_id, context.model(), &new_session_oids)
                .await;
            match &result {
                Ok(RunOutcome::Persisted { rows }) => {
                    info!(farm_id = %farm_id, rows, "[PipelineRunner] Run complete");
                }
                Ok(RunOutcome::Skipped(_)) => {}
                Err(e) => error!(farm_id = %farm_id, error = %e, "[PipelineRunner] Run failed"),
            }
            // Receiver may already be dropped; the outcome is optional.
            tx.send(result).ok();
        });

        Some(RunHandle {
            farm_id: handle_farm,
            rx,
        })
    }

    /// Stop accepting work and wait for in-flight runs.
    pub async fn shutdown(&self) {
        self.tracker.close();
        info!(in_flight = self.tracker.len(), "[PipelineRunner] Waiting for in-flight runs");
        self.tracker.wait().await;
        info!("[PipelineRunner] Shutdown complete");
    }

    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    pub fn stats(&self) -> RunnerStats {
        RunnerStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            in_flight: self.tracker.len(),
            pipeline: self.context.pipeline.stats(),
        }
    }

    fn farm_lock(&self, farm_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .farm_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        locks
            .entry(farm_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

/// Runner statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerStats {
    pub submitted: u64,
    /// Triggers dropped before spawning (no sessions or no model)
    pub ignored: u64,
    pub in_flight: usize,
    pub pipeline: PipelineStats,
}

impl std::fmt::Display for RunnerStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Runner: {} submitted, {} ignored, {} in flight | {}",
            self.submitted, self.ignored, self.in_flight, self.pipeline
        )
    }
}
