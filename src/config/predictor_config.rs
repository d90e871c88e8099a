//! Predictor Configuration - all pipeline tunables as TOML values
//!
//! Each section implements `Default` with values from [`super::defaults`],
//! so a missing file or a partial file behaves exactly like the built-in
//! constants.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::defaults::*;
use crate::types::ModelConfig;

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "MDI_PREDICTOR_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "predictor_config.toml";

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a predictor deployment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictorConfig {
    /// Context window selection
    #[serde(default)]
    pub window: WindowConfig,

    /// Rolling feature windows
    #[serde(default)]
    pub features: FeatureConfig,

    /// Probability scoring and coefficient cache
    #[serde(default)]
    pub scoring: ScoringConfig,

    /// Trained regression model artifact
    #[serde(default)]
    pub model: ModelArtifactConfig,

    /// Tabular store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Background runner behaviour
    #[serde(default)]
    pub runner: RunnerConfig,
}

impl PredictorConfig {
    /// Load configuration using the standard search order:
    /// 1. `$MDI_PREDICTOR_CONFIG`
    /// 2. `./predictor_config.toml`
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded predictor config from {}", CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", CONFIG_ENV_VAR);
            }
        }

        let local = PathBuf::from(LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!("Loaded predictor config from ./{}", LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", LOCAL_CONFIG_FILE);
                }
            }
        }

        info!("No {} found, using built-in defaults", LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str::<Self>(&contents)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })
            .and_then(|config| config.validate().map(|()| config))
    }

    /// Check every section, collecting all violations before failing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        if self.window.recent_days <= 0 {
            errors.push(format!(
                "window.recent_days ({}) must be positive",
                self.window.recent_days
            ));
        }
        if self.window.fallback_days <= 0 {
            errors.push(format!(
                "window.fallback_days ({}) must be positive",
                self.window.fallback_days
            ));
        }
        if self.features.short_window == 0 {
            errors.push("features.short_window must be at least 1".to_string());
        }
        if self.features.long_window == 0 {
            errors.push("features.long_window must be at least 1".to_string());
        }
        if self.scoring.cache_ttl_secs == 0 {
            errors.push("scoring.cache_ttl_secs must be at least 1".to_string());
        }
        for (name, value) in [
            ("scoring.default_intercept", self.scoring.default_intercept),
            ("scoring.default_coef_current_mdi", self.scoring.default_coef_current_mdi),
            ("scoring.default_coef_predicted_mdi", self.scoring.default_coef_predicted_mdi),
        ] {
            if !value.is_finite() {
                errors.push(format!("{name} must be a finite number"));
            }
        }
        if self.store.max_connections == 0 {
            errors.push("store.max_connections must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// Context window selection: recency window with a fixed historical fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Days before "now" covered by the primary window
    #[serde(default = "default_recent_days")]
    pub recent_days: i64,

    /// Reference date anchoring the fallback window
    #[serde(default = "default_fallback_reference")]
    pub fallback_reference: NaiveDate,

    /// Days before the reference date covered by the fallback window
    #[serde(default = "default_fallback_days")]
    pub fallback_days: i64,
}

fn default_recent_days() -> i64 { RECENT_WINDOW_DAYS }
fn default_fallback_days() -> i64 { FALLBACK_WINDOW_DAYS }
fn default_fallback_reference() -> NaiveDate {
    let (y, m, d) = FALLBACK_REFERENCE_DATE;
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or(NaiveDate::MIN)
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            recent_days: default_recent_days(),
            fallback_reference: default_fallback_reference(),
            fallback_days: default_fallback_days(),
        }
    }
}

impl WindowConfig {
    pub fn recent_span(&self) -> Duration {
        Duration::days(self.recent_days)
    }

    pub fn fallback_span(&self) -> Duration {
        Duration::days(self.fallback_days)
    }

    /// Midnight UTC of the fallback reference date.
    pub fn fallback_reference_instant(&self) -> DateTime<Utc> {
        self.fallback_reference.and_time(NaiveTime::MIN).and_utc()
    }
}

/// Rolling feature window sizes, in sessions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureConfig {
    #[serde(default = "default_short_window")]
    pub short_window: usize,
    #[serde(default = "default_long_window")]
    pub long_window: usize,
}

fn default_short_window() -> usize { SHORT_ROLLING_WINDOW }
fn default_long_window() -> usize { LONG_ROLLING_WINDOW }

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            short_window: default_short_window(),
            long_window: default_long_window(),
        }
    }
}

/// Probability scoring: coefficient cache TTL and fallback coefficients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_intercept")]
    pub default_intercept: f64,
    #[serde(default = "default_coef_current_mdi")]
    pub default_coef_current_mdi: f64,
    #[serde(default = "default_coef_predicted_mdi")]
    pub default_coef_predicted_mdi: f64,
}

fn default_cache_ttl_secs() -> u64 { CONFIG_CACHE_TTL_SECS }
fn default_intercept() -> f64 { DEFAULT_INTERCEPT }
fn default_coef_current_mdi() -> f64 { DEFAULT_COEF_CURRENT_MDI }
fn default_coef_predicted_mdi() -> f64 { DEFAULT_COEF_PREDICTED_MDI }

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            default_intercept: default_intercept(),
            default_coef_current_mdi: default_coef_current_mdi(),
            default_coef_predicted_mdi: default_coef_predicted_mdi(),
        }
    }
}

impl ScoringConfig {
    /// Coefficients served when the store has none or cannot be reached.
    pub fn fallback_coefficients(&self) -> ModelConfig {
        ModelConfig::new(
            self.default_intercept,
            self.default_coef_current_mdi,
            self.default_coef_predicted_mdi,
        )
    }

    #[allow(clippy::cast_possible_wrap)]
    pub fn cache_ttl(&self) -> Duration {
        Duration::seconds(self.cache_ttl_secs as i64)
    }
}

/// Location of the trained regression model artifact.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelArtifactConfig {
    /// JSON artifact path; `None` runs the service without a model
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Tabular store connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL; `DATABASE_URL` takes precedence at startup
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 { STORE_MAX_CONNECTIONS }
fn default_acquire_timeout_secs() -> u64 { STORE_ACQUIRE_TIMEOUT_SECS }

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
        }
    }
}

/// Background runner behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Serialize concurrent runs for the same farm
    #[serde(default = "default_serialize_per_farm")]
    pub serialize_per_farm: bool,
}

fn default_serialize_per_farm() -> bool { true }

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            serialize_per_farm: default_serialize_per_farm(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config parse error ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}
