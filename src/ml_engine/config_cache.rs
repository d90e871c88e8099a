//! TTL cache of the logistic coefficients
//!
//! The coefficients live in the store and change rarely (the training side
//! rewrites them). Runs read them through this cache so a burst of ingestion
//! triggers costs at most one store query per TTL period.

use chrono::{DateTime, Duration, Utc};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::storage::PredictionStore;
use crate::types::ModelConfig;

#[derive(Debug, Clone, Copy)]
struct CachedConfig {
    config: ModelConfig,
    fetched_at: DateTime<Utc>,
}

pub struct ConfigCache {
    store: Arc<dyn PredictionStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    fallback: ModelConfig,
    slot: RwLock<Option<CachedConfig>>,
}

impl ConfigCache {
    pub fn new(
        store: Arc<dyn PredictionStore>,
        clock: Arc<dyn Clock>,
        ttl: Duration,
        fallback: ModelConfig,
    ) -> Self {
        Self {
            store,
            clock,
            ttl,
            fallback,
            slot: RwLock::new(None),
        }
    }

    /// Current coefficients.
    ///
    /// Served from cache while younger than the TTL. Otherwise the latest row
    /// is fetched and cached. When the store has no row or the query fails,
    /// the fallback coefficients are returned and nothing is cached, so the
    /// next call retries the store.
    pub async fn get_config(&self) -> ModelConfig {
        let now = self.clock.now();
        if let Some(cached) = self.fresh(now) {
            return cached;
        }

        match self.store.latest_model_config().await {
            Ok(Some(config)) => {
                debug!(
                    intercept = config.intercept,
                    coef_current_mdi = config.coef_current_mdi,
                    coef_predicted_mdi = config.coef_predicted_mdi,
                    "Refreshed probability coefficients"
                );
                *self.slot.write().unwrap_or_else(PoisonError::into_inner) = Some(CachedConfig {
                    config,
                    fetched_at: now,
                });
                config
            }
            Ok(None) => {
                warn!("No probability coefficients in store, using defaults");
                self.fallback
            }
            Err(e) => {
                warn!(error = %e, "Failed to fetch probability coefficients, using defaults");
                self.fallback
            }
        }
    }

    /// Drop the cached entry so the next call hits the store.
    pub fn invalidate(&self) {
        *self.slot.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    fn fresh(&self, now: DateTime<Utc>) -> Option<ModelConfig> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        (*slot)
            .filter(|c| now - c.fetched_at < self.ttl)
            .map(|c| c.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::memory::FailurePoint;
    use crate::storage::InMemoryStore;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 5, 0, 0).unwrap()
    }

    fn defaults() -> ModelConfig {
        ModelConfig::new(-4.5, 2.0, 0.5)
    }

    fn cache(store: &Arc<InMemoryStore>, clock: &Arc<ManualClock>) -> ConfigCache {
        ConfigCache::new(
            store.clone(),
            clock.clone(),
            Duration::seconds(300),
            defaults(),
        )
    }

    #[tokio::test]
    async fn test_serves_cached_value_within_ttl() {
        let store = Arc::new(InMemoryStore::new());
        store.add_model_config(ModelConfig::new(-3.0, 1.5, 0.25));
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&store, &clock);

        let first = cache.get_config().await;
        clock.advance(Duration::seconds(299));
        let second = cache.get_config().await;

        assert_eq!(first, second);
        assert!((first.intercept + 3.0).abs() < f64::EPSILON);
        assert_eq!(store.call_log().config_fetches, 1);
    }

    #[tokio::test]
    async fn test_refetches_after_ttl() {
        let store = Arc::new(InMemoryStore::new());
        store.add_model_config(ModelConfig::new(-3.0, 1.5, 0.25));
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&store, &clock);

        cache.get_config().await;
        clock.advance(Duration::seconds(301));
        cache.get_config().await;

        assert_eq!(store.call_log().config_fetches, 2);
    }

    #[tokio::test]
    async fn test_missing_row_returns_defaults_uncached() {
        let store = Arc::new(InMemoryStore::new());
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&store, &clock);

        assert_eq!(cache.get_config().await, defaults());
        assert_eq!(cache.get_config().await, defaults());
        assert_eq!(store.call_log().config_fetches, 2);
    }

    #[tokio::test]
    async fn test_store_error_returns_defaults_and_recovers() {
        let store = Arc::new(InMemoryStore::new());
        store.add_model_config(ModelConfig::new(-1.0, 1.0, 1.0));
        store.set_failure(FailurePoint::ModelConfig, true);
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&store, &clock);

        assert_eq!(cache.get_config().await, defaults());

        store.set_failure(FailurePoint::ModelConfig, false);
        let recovered = cache.get_config().await;
        assert!((recovered.intercept + 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_invalidate_forces_refetch() {
        let store = Arc::new(InMemoryStore::new());
        store.add_model_config(ModelConfig::new(-3.0, 1.5, 0.25));
        let clock = Arc::new(ManualClock::new(start()));
        let cache = cache(&store, &clock);

        cache.get_config().await;
        cache.invalidate();
        cache.get_config().await;
        assert_eq!(store.call_log().config_fetches, 2);
    }
}
