//! Context Window Fetcher
//!
//! Pulls the sessions (and their voluntary metrics) that give the new batch
//! its trailing history. The recency window is tried first; when it returns
//! no sessions at all, a fixed historical window anchored on a reference
//! date is tried instead so recorded datasets can still be replayed.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::WindowConfig;
use crate::storage::{PredictionStore, StoreError};
use crate::types::{MilkingSession, SessionOid, VoluntarySessionMetrics};

/// Which time window produced the context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStrategy {
    /// `now - recent_days`
    Recent,
    /// `fallback_reference - fallback_days`
    Fallback,
}

impl std::fmt::Display for WindowStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WindowStrategy::Recent => write!(f, "recent"),
            WindowStrategy::Fallback => write!(f, "fallback"),
        }
    }
}

/// Sessions and voluntary metrics for one farm over one time window.
#[derive(Debug, Clone)]
pub struct ContextWindow {
    pub strategy: WindowStrategy,
    /// Inclusive lower bound on session start time
    pub since: DateTime<Utc>,
    pub sessions: Vec<MilkingSession>,
    /// Restricted to ids present in `sessions`
    pub metrics: Vec<VoluntarySessionMetrics>,
}

impl ContextWindow {
    fn sessions_only(
        strategy: WindowStrategy,
        since: DateTime<Utc>,
        sessions: Vec<MilkingSession>,
    ) -> Self {
        Self {
            strategy,
            since,
            sessions,
            metrics: Vec::new(),
        }
    }

    pub fn session_oids(&self) -> Vec<SessionOid> {
        self.sessions.iter().map(|s| s.oid).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ContextWindowFetcher {
    config: WindowConfig,
}

impl ContextWindowFetcher {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn recent_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.config.recent_span()
    }

    pub fn fallback_cutoff(&self) -> DateTime<Utc> {
        self.config.fallback_reference_instant() - self.config.fallback_span()
    }

    /// Sessions only (`metrics` left empty), recent window first then the
    /// fallback window. Returns `None` when both windows are empty.
    pub async fn fetch_sessions(
        &self,
        store: &dyn PredictionStore,
        farm_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ContextWindow>, StoreError> {
        let since = self.recent_cutoff(now);
        debug!(farm_id, %since, "Fetching sessions (strategy: recent)");
        let sessions = store.recent_sessions(farm_id, since).await?;
        if !sessions.is_empty() {
            return Ok(Some(ContextWindow::sessions_only(
                WindowStrategy::Recent,
                since,
                sessions,
            )));
        }

        let since = self.fallback_cutoff();
        warn!(
            farm_id,
            %since,
            "No recent sessions, switching to fallback window"
        );
        let sessions = store.recent_sessions(farm_id, since).await?;
        if sessions.is_empty() {
            return Ok(None);
        }
        Ok(Some(ContextWindow::sessions_only(
            WindowStrategy::Fallback,
            since,
            sessions,
        )))
    }

    /// Full context window: sessions plus the voluntary metrics for exactly
    /// those session ids.
    pub async fn fetch(
        &self,
        store: &dyn PredictionStore,
        farm_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ContextWindow>, StoreError> {
        let Some(mut window) = self.fetch_sessions(store, farm_id, now).await? else {
            return Ok(None);
        };

        window.metrics = store
            .voluntary_metrics_by_ids(farm_id, &window.session_oids())
            .await?;

        info!(
            farm_id,
            strategy = %window.strategy,
            sessions = window.sessions.len(),
            metrics = window.metrics.len(),
            "Fetched context window"
        );

        Ok(Some(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use chrono::{Duration, TimeZone};

    const FARM: &str = "farm-1";

    fn fetcher() -> ContextWindowFetcher {
        ContextWindowFetcher::new(WindowConfig::default())
    }

    #[test]
    fn test_cutoffs() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let f = fetcher();
        assert_eq!(f.recent_cutoff(now), now - Duration::days(7));
        assert_eq!(
            f.fallback_cutoff(),
            Utc.with_ymd_and_hms(2025, 11, 15, 0, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_recent_window_skips_fallback() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let store = InMemoryStore::new();
        store.add_sessions(FARM, vec![MilkingSession::new(1, Some(7), now - Duration::days(1))]);
        store.add_voluntary_metrics(FARM, vec![VoluntarySessionMetrics::new(1)]);

        let window = fetcher().fetch(&store, FARM, now).await.unwrap().unwrap();
        assert_eq!(window.strategy, WindowStrategy::Recent);
        assert_eq!(window.session_oids(), vec![1]);
        assert_eq!(window.metrics.len(), 1);
        assert_eq!(store.call_log().session_cutoffs.len(), 1);
    }

    #[tokio::test]
    async fn test_fallback_used_when_recent_empty() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let recorded = Utc.with_ymd_and_hms(2025, 11, 20, 6, 0, 0).unwrap();
        let store = InMemoryStore::new();
        store.add_sessions(FARM, vec![MilkingSession::new(5, Some(7), recorded)]);

        let window = fetcher().fetch(&store, FARM, now).await.unwrap().unwrap();
        assert_eq!(window.strategy, WindowStrategy::Fallback);
        assert_eq!(
            store.call_log().session_cutoffs,
            vec![now - Duration::days(7), fetcher().fallback_cutoff()]
        );
    }

    #[tokio::test]
    async fn test_both_windows_empty() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap();
        let store = InMemoryStore::new();

        assert!(fetcher().fetch(&store, FARM, now).await.unwrap().is_none());
        assert_eq!(store.call_log().voluntary_lookups, 0);
    }
}
