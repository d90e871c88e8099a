//! Prediction Pipeline Module
//!
//! ```text
//! IngestionTrigger ──> PipelineRunner ──> PredictionPipeline
//!                                          ├─ ContextWindowFetcher
//!                                          ├─ FeatureEngine
//!                                          ├─ LactationEnricher
//!                                          ├─ inference (model + probability)
//!                                          └─ PersistenceWriter
//! ```
//!
//! Runs are detached from the trigger and never retried; a failed run is
//! picked up again only by the next ingestion batch.

mod state;
mod coordinator;
pub mod context_window;
pub mod features;
pub mod lactation;
pub mod inference;
pub mod writer;
pub mod runner;

pub use state::AppContext;
pub use coordinator::{PipelineError, PipelineStats, PredictionPipeline, RunOutcome, SkipReason};
pub use context_window::{ContextWindow, ContextWindowFetcher, WindowStrategy};
pub use features::FeatureEngine;
pub use lactation::LactationEnricher;
pub use writer::PersistenceWriter;
pub use runner::{IngestionTrigger, PipelineRunner, RunHandle, RunnerStats};
