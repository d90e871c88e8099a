//! Tabular Store Access
//!
//! The pipeline only ever issues a handful of concrete queries against the
//! store. They are expressed as named methods on [`PredictionStore`] so that
//! backends can be swapped without touching pipeline code:
//! - `InMemoryStore`: in-memory tables for tests and offline replays
//! - `PgStore`: PostgreSQL via sqlx (feature `postgres`)

pub mod persistence;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use persistence::{PredictionStore, StoreError};
pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

/// Table names of the source schema.
pub mod tables {
    pub const SESSIONS: &str = "DELPRO_sessions_milk_yield";
    pub const VOLUNTARY_SESSIONS: &str = "DELPRO_voluntary_sessions_milk_yield";
    pub const LACTATIONS: &str = "DELPRO_animals_lactations_summary";
    pub const MODEL_CONFIG: &str = "system_model_config";
    pub const PREDICTIONS: &str = "mdi_predictor_mastertable";
}
