//! ML Engine for mastitis risk scoring
//!
//! ## Architecture
//! - `model`: regressor trait and the named-column feature matrix it consumes
//! - `linear`: JSON-artifact linear regressor exported by the training side
//! - `probability`: logistic scorer turning (current MDI, predicted MDI) into a risk
//! - `config_cache`: TTL cache of the logistic coefficients held in the store

pub mod model;
pub mod linear;
pub mod probability;
pub mod config_cache;

// Re-export public types
pub use model::{FeatureMatrix, MdiRegressor, ModelError};
pub use linear::LinearRegressor;
pub use probability::mastitis_probability;
pub use config_cache::ConfigCache;
