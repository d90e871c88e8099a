//! Logistic mastitis probability
//!
//! Formula: P = 1 / (1 + exp(-(intercept + w1 * current_mdi + w2 * predicted_mdi)))

use crate::config::defaults::{OVERFLOW_NEGATIVE_PROBABILITY, OVERFLOW_POSITIVE_PROBABILITY};
use crate::types::ModelConfig;

/// Probability of mastitis in [0, 1] for one session.
///
/// Missing inputs count as `0.0`. When `exp(-logit)` overflows the result is
/// clamped to 0.90 for a positive logit and 0.0 otherwise; the asymmetry is
/// long-standing behaviour that downstream alert thresholds were tuned on.
/// A NaN input propagates to a NaN probability.
pub fn mastitis_probability(
    coefficients: &ModelConfig,
    current_mdi: Option<f64>,
    predicted_mdi: Option<f64>,
) -> f64 {
    let current = current_mdi.unwrap_or(0.0);
    let predicted = predicted_mdi.unwrap_or(0.0);

    let logit = coefficients.intercept
        + coefficients.coef_current_mdi * current
        + coefficients.coef_predicted_mdi * predicted;

    let e = (-logit).exp();
    if e.is_infinite() {
        if logit > 0.0 {
            OVERFLOW_POSITIVE_PROBABILITY
        } else {
            OVERFLOW_NEGATIVE_PROBABILITY
        }
    } else {
        1.0 / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ModelConfig {
        ModelConfig::new(-4.5, 2.0, 0.5)
    }

    #[test]
    fn test_default_curve_reference_points() {
        let c = defaults();
        assert!((mastitis_probability(&c, Some(1.4), Some(0.0)) - 0.1545).abs() < 1e-3);
        assert!((mastitis_probability(&c, Some(2.0), Some(0.0)) - 0.3775).abs() < 1e-3);
        assert!((mastitis_probability(&c, Some(3.0), Some(0.0)) - 0.8176).abs() < 1e-3);
    }

    #[test]
    fn test_missing_inputs_count_as_zero() {
        let c = defaults();
        let p = mastitis_probability(&c, None, None);
        let expected = 1.0 / (1.0 + 4.5_f64.exp());
        assert!((p - expected).abs() < 1e-12);
        assert!((mastitis_probability(&c, Some(2.0), None) - 0.3775).abs() < 1e-3);
    }

    #[test]
    fn test_predicted_mdi_raises_risk() {
        let c = defaults();
        let low = mastitis_probability(&c, Some(1.4), Some(0.0));
        let high = mastitis_probability(&c, Some(1.4), Some(3.0));
        assert!(high > low);
    }

    #[test]
    fn test_negative_overflow_clamps_to_zero() {
        let c = defaults();
        let p = mastitis_probability(&c, Some(-1_000.0), Some(0.0));
        assert!(p.abs() < f64::EPSILON);
        let p = mastitis_probability(&c, Some(f64::NEG_INFINITY), Some(0.0));
        assert!(p.abs() < f64::EPSILON);
    }

    #[test]
    fn test_large_positive_logit_saturates_without_clamp() {
        let c = defaults();
        let p = mastitis_probability(&c, Some(1_000.0), Some(0.0));
        assert!((p - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_nan_input_propagates() {
        let c = defaults();
        assert!(mastitis_probability(&c, Some(2.0), Some(f64::NAN)).is_nan());
    }
}
