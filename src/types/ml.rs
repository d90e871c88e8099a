//! Probability-model types: the logistic coefficients sourced from the store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Logistic regression coefficients mapping (current MDI, predicted MDI)
/// to a mastitis probability.
///
/// Missing coefficients deserialize as `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub coef_current_mdi: f64,
    #[serde(default)]
    pub coef_predicted_mdi: f64,
    /// When the training side last wrote this row (absent for built-in defaults)
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ModelConfig {
    pub fn new(intercept: f64, coef_current_mdi: f64, coef_predicted_mdi: f64) -> Self {
        Self {
            intercept,
            coef_current_mdi,
            coef_predicted_mdi,
            updated_at: None,
        }
    }
}
