//! Shared data structures for the mastitis prediction pipeline
//!
//! This module defines the core types that flow through a pipeline run:
//! - Stage 1: MilkingSession + VoluntarySessionMetrics (context window)
//! - Stage 2: FeatureRow (joined, rolling averages)
//! - Stage 3: LactationSummary (lactation context)
//! - Stage 4: ModelConfig (logistic coefficients for the risk probability)
//! - Stage 5: PredictionRecord (persisted output row)

mod session;
mod lactation;
mod feature;
mod ml;
mod prediction;

pub use session::*;
pub use lactation::*;
pub use feature::*;
pub use ml::*;
pub use prediction::*;
