//! PredictionStore trait, one named method per query the pipeline issues

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::types::{
    LactationSummary, MilkingSession, ModelConfig, PredictionRecord, SessionOid,
    VoluntarySessionMetrics,
};

/// Read/write access to the tabular store.
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across pipeline tasks.
#[async_trait]
pub trait PredictionStore: Send + Sync {
    /// Sessions of `farm_id` whose start time is at or after `since`.
    async fn recent_sessions(
        &self,
        farm_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MilkingSession>, StoreError>;

    /// Voluntary metrics of `farm_id` restricted to the given session ids.
    async fn voluntary_metrics_by_ids(
        &self,
        farm_id: &str,
        oids: &[SessionOid],
    ) -> Result<Vec<VoluntarySessionMetrics>, StoreError>;

    /// Every lactation summary recorded for `farm_id`.
    async fn lactation_summaries(&self, farm_id: &str)
        -> Result<Vec<LactationSummary>, StoreError>;

    /// The most recently updated probability-model coefficients, if any.
    async fn latest_model_config(&self) -> Result<Option<ModelConfig>, StoreError>;

    /// Insert all records as one batch.
    async fn insert_predictions(&self, records: &[PredictionRecord]) -> Result<(), StoreError>;

    /// Any registered farm, used by manual runs that do not name one.
    async fn first_farm_id(&self) -> Result<Option<String>, StoreError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("query on {table} failed: {message}")]
    Query { table: &'static str, message: String },
    #[error("insert into {table} failed: {message}")]
    Insert { table: &'static str, message: String },
    #[error("invalid farm id {0:?}")]
    InvalidFarmId(String),
    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}
