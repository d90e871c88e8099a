//! MDI Predictor: post-ingestion mastitis risk scoring
//!
//! For every batch of newly ingested milking sessions, builds per-animal
//! rolling-window features over a recent context window, adds lactation
//! context, runs the trained MDI regressor and converts its output into a
//! mastitis probability with a cached logistic model.
//!
//! ## Architecture
//!
//! - **Storage**: `PredictionStore` repository trait (in-memory and PostgreSQL backends)
//! - **ML Engine**: regressor trait, JSON linear model, probability scorer, coefficient cache
//! - **Pipeline**: context window, features, lactation, inference, persistence, runner

pub mod config;
pub mod types;
pub mod clock;
pub mod storage;
pub mod ml_engine;
pub mod pipeline;

// Re-export configuration
pub use config::{ConfigError, PredictorConfig};

// Re-export commonly used types
pub use types::{
    Feature, FeatureRow, LactationSummary, MilkingSession, ModelConfig, PredictionRecord,
    ScoredRow, SessionOid, VoluntarySessionMetrics,
};

pub use clock::{Clock, ManualClock, SystemClock};

// Re-export storage
pub use storage::{InMemoryStore, PredictionStore, StoreError};
#[cfg(feature = "postgres")]
pub use storage::PgStore;

// Re-export ML Engine components
pub use ml_engine::{
    mastitis_probability, ConfigCache, FeatureMatrix, LinearRegressor, MdiRegressor, ModelError,
};

// Re-export pipeline components
pub use pipeline::{
    AppContext, IngestionTrigger, PipelineError, PipelineRunner, PredictionPipeline, RunHandle,
    RunOutcome, SkipReason,
};
