//! System-wide default constants.
//!
//! Every value here is the built-in default for a field of
//! [`super::PredictorConfig`]. Grouped by pipeline stage.

// ============================================================================
// Context Window
// ============================================================================

/// Primary recency window: sessions with start time >= now - 7 days.
pub const RECENT_WINDOW_DAYS: i64 = 7;

/// Fixed historical reference date for the fallback window (year, month, day).
///
/// Used only when the recency window is empty, so recorded historical
/// datasets can still be scored.
pub const FALLBACK_REFERENCE_DATE: (i32, u32, u32) = (2025, 11, 22);

/// Fallback window length before the reference date (days).
pub const FALLBACK_WINDOW_DAYS: i64 = 7;

// ============================================================================
// Feature Engine
// ============================================================================

/// Short rolling window (sessions): conductivity, blood, MDI, flow, pulsation, AMD.
pub const SHORT_ROLLING_WINDOW: usize = 15;

/// Long rolling window (sessions): total and expected yield.
pub const LONG_ROLLING_WINDOW: usize = 21;

// ============================================================================
// Probability Scoring
// ============================================================================

/// Time-to-live of a cached coefficient snapshot (seconds).
pub const CONFIG_CACHE_TTL_SECS: u64 = 300;

/// Default logistic intercept, used when no coefficients are stored.
///
/// With the default coefficients: MDI 1.4 gives ~15%, 2.0 gives ~37%,
/// 3.0 gives ~81%.
pub const DEFAULT_INTERCEPT: f64 = -4.5;

/// Default weight on the current session MDI.
pub const DEFAULT_COEF_CURRENT_MDI: f64 = 2.0;

/// Default weight on the model-predicted MDI.
pub const DEFAULT_COEF_PREDICTED_MDI: f64 = 0.5;

/// Probability returned when `exp(-logit)` overflows and the logit is positive.
pub const OVERFLOW_POSITIVE_PROBABILITY: f64 = 0.90;

/// Probability returned when `exp(-logit)` overflows otherwise.
pub const OVERFLOW_NEGATIVE_PROBABILITY: f64 = 0.0;

// ============================================================================
// Store
// ============================================================================

/// Maximum pooled connections to the tabular store.
pub const STORE_MAX_CONNECTIONS: u32 = 10;

/// Seconds to wait for a pooled connection.
pub const STORE_ACQUIRE_TIMEOUT_SECS: u64 = 10;
