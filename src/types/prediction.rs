//! Persisted output of a pipeline run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AnimalOid, FeatureRow, SessionOid};

/// A feature row after inference and probability scoring.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRow {
    pub features: FeatureRow,
    /// Regression model output ("mdi_2d")
    pub predicted_mdi: f64,
    /// Logistic risk probability in [0, 1], or NaN when an input was NaN
    pub probability: f64,
}

/// One row of the prediction master table.
///
/// Float columns are `None` whenever the computed value was missing or
/// non-finite; the store never sees NaN or infinity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub farm_id: String,
    pub session_oid: SessionOid,
    pub animal_oid: AnimalOid,

    #[serde(rename = "Mdi")]
    pub mdi: Option<f64>,
    #[serde(rename = "TotalYield")]
    pub total_yield: Option<f64>,
    #[serde(rename = "AvgConductivity")]
    pub avg_conductivity: Option<f64>,
    #[serde(rename = "MaxBlood")]
    pub max_blood: Option<f64>,
    #[serde(rename = "MilkFlowDuration")]
    pub milk_flow_duration: Option<f64>,
    #[serde(rename = "SmartPulsationRatio")]
    pub smart_pulsation_ratio: Option<f64>,
    #[serde(rename = "CurrentCombinedAmd")]
    pub current_combined_amd: Option<f64>,
    #[serde(rename = "Incomplete")]
    pub incomplete: i64,
    #[serde(rename = "Kickoff")]
    pub kickoff: i64,

    #[serde(rename = "AvgConductivity_ma15")]
    pub avg_conductivity_ma15: Option<f64>,
    #[serde(rename = "MaxBlood_ma15")]
    pub max_blood_ma15: Option<f64>,
    #[serde(rename = "Mdi_ma15")]
    pub mdi_ma15: Option<f64>,
    #[serde(rename = "MilkFlowDuration_ma15")]
    pub milk_flow_duration_ma15: Option<f64>,
    #[serde(rename = "SmartPulsationRatio_ma15")]
    pub smart_pulsation_ratio_ma15: Option<f64>,
    #[serde(rename = "CurrentCombinedAmd_ma15")]
    pub current_combined_amd_ma15: Option<f64>,
    #[serde(rename = "TotalYield_ma21")]
    pub total_yield_ma21: Option<f64>,
    #[serde(rename = "ExpectedYield_ma21")]
    pub expected_yield_ma21: Option<f64>,

    #[serde(rename = "LactationNumber")]
    pub lactation_number: i64,
    #[serde(rename = "DIM")]
    pub days_in_milk: i64,

    #[serde(rename = "BeginTime")]
    pub begin_time: DateTime<Utc>,
    #[serde(rename = "EndTime")]
    pub end_time: Option<DateTime<Utc>>,

    #[serde(rename = "mdi_2d")]
    pub predicted_mdi: Option<f64>,
    #[serde(rename = "prob_mastitis")]
    pub mastitis_probability: Option<f64>,
}
