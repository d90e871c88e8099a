//! Application context
//!
//! Everything a pipeline run needs, built once at startup and shared
//! read-only between the runner's tasks.

use std::sync::Arc;

use super::coordinator::PredictionPipeline;
use crate::clock::{Clock, SystemClock};
use crate::config::PredictorConfig;
use crate::ml_engine::{ConfigCache, MdiRegressor};
use crate::storage::PredictionStore;

pub struct AppContext {
    pub config: PredictorConfig,
    pub store: Arc<dyn PredictionStore>,
    /// Loaded regression model; `None` disables scoring entirely
    pub model: Option<Arc<dyn MdiRegressor>>,
    pub clock: Arc<dyn Clock>,
    pub config_cache: Arc<ConfigCache>,
    pub pipeline: PredictionPipeline,
}

impl AppContext {
    pub fn new(
        config: PredictorConfig,
        store: Arc<dyn PredictionStore>,
        model: Option<Arc<dyn MdiRegressor>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let config_cache = Arc::new(ConfigCache::new(
            store.clone(),
            clock.clone(),
            config.scoring.cache_ttl(),
            config.scoring.fallback_coefficients(),
        ));
        let pipeline =
            PredictionPipeline::new(store.clone(), config_cache.clone(), clock.clone(), &config);
        Self {
            config,
            store,
            model,
            clock,
            config_cache,
            pipeline,
        }
    }

    /// Context on wall-clock time.
    pub fn with_system_clock(
        config: PredictorConfig,
        store: Arc<dyn PredictionStore>,
        model: Option<Arc<dyn MdiRegressor>>,
    ) -> Self {
        Self::new(config, store, model, Arc::new(SystemClock))
    }

    pub fn model(&self) -> Option<&dyn MdiRegressor> {
        self.model.as_deref()
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("store", &self.store.backend_name())
            .field("model", &self.model.as_ref().map(|m| m.name().to_string()))
            .finish_non_exhaustive()
    }
}
