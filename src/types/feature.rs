//! Model input features and the engineered per-session feature row.

use serde::{Deserialize, Serialize};

use super::{MilkingSession, SessionOid, VoluntarySessionMetrics};

/// Every column the regression model can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    Mdi,
    TotalYield,
    AvgConductivity,
    MaxBlood,
    MilkFlowDuration,
    SmartPulsationRatio,
    CurrentCombinedAmd,
    Incomplete,
    Kickoff,
    /// Rolling-average source only; not a model input
    ExpectedYield,
    AvgConductivityMa15,
    MaxBloodMa15,
    MdiMa15,
    MilkFlowDurationMa15,
    SmartPulsationRatioMa15,
    CurrentCombinedAmdMa15,
    TotalYieldMa21,
    ExpectedYieldMa21,
    LactationNumber,
    DaysInMilk,
}

impl Feature {
    /// Canonical input order used when the model does not declare its own.
    pub const CANONICAL_ORDER: [Feature; 19] = [
        Feature::Mdi,
        Feature::TotalYield,
        Feature::AvgConductivity,
        Feature::MaxBlood,
        Feature::MilkFlowDuration,
        Feature::SmartPulsationRatio,
        Feature::CurrentCombinedAmd,
        Feature::Incomplete,
        Feature::Kickoff,
        Feature::AvgConductivityMa15,
        Feature::MaxBloodMa15,
        Feature::MdiMa15,
        Feature::MilkFlowDurationMa15,
        Feature::SmartPulsationRatioMa15,
        Feature::CurrentCombinedAmdMa15,
        Feature::TotalYieldMa21,
        Feature::ExpectedYieldMa21,
        Feature::LactationNumber,
        Feature::DaysInMilk,
    ];

    /// Column name as written by the training side.
    pub fn name(self) -> &'static str {
        match self {
            Feature::Mdi => "Mdi",
            Feature::TotalYield => "TotalYield",
            Feature::AvgConductivity => "AvgConductivity",
            Feature::MaxBlood => "MaxBlood",
            Feature::MilkFlowDuration => "MilkFlowDuration",
            Feature::SmartPulsationRatio => "SmartPulsationRatio",
            Feature::CurrentCombinedAmd => "CurrentCombinedAmd",
            Feature::Incomplete => "Incomplete",
            Feature::Kickoff => "Kickoff",
            Feature::ExpectedYield => "ExpectedYield",
            Feature::AvgConductivityMa15 => "AvgConductivity_ma15",
            Feature::MaxBloodMa15 => "MaxBlood_ma15",
            Feature::MdiMa15 => "Mdi_ma15",
            Feature::MilkFlowDurationMa15 => "MilkFlowDuration_ma15",
            Feature::SmartPulsationRatioMa15 => "SmartPulsationRatio_ma15",
            Feature::CurrentCombinedAmdMa15 => "CurrentCombinedAmd_ma15",
            Feature::TotalYieldMa21 => "TotalYield_ma21",
            Feature::ExpectedYieldMa21 => "ExpectedYield_ma21",
            Feature::LactationNumber => "LactationNumber",
            Feature::DaysInMilk => "DIM",
        }
    }

    /// Reverse of [`Feature::name`].
    pub fn from_name(name: &str) -> Option<Feature> {
        Self::CANONICAL_ORDER.into_iter().find(|f| f.name() == name)
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Trailing averages over the short window (15 sessions by default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ShortWindowAverages {
    pub avg_conductivity: Option<f64>,
    pub max_blood: Option<f64>,
    pub mdi: Option<f64>,
    pub milk_flow_duration: Option<f64>,
    pub smart_pulsation_ratio: Option<f64>,
    pub current_combined_amd: Option<f64>,
}

/// Trailing averages over the long window (21 sessions by default).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LongWindowAverages {
    pub total_yield: Option<f64>,
    pub expected_yield: Option<f64>,
}

/// A session joined with its voluntary metrics, rolling averages and
/// lactation context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub session: MilkingSession,
    pub metrics: VoluntarySessionMetrics,
    pub short_window: ShortWindowAverages,
    pub long_window: LongWindowAverages,
    /// 0 until the lactation enricher runs, or when the animal has no summary
    pub lactation_number: i64,
    /// Whole days since the current lactation started
    pub days_in_milk: i64,
}

impl FeatureRow {
    /// Join a session with its metrics; averages and lactation context are
    /// filled in by later stages.
    pub fn joined(session: MilkingSession, metrics: VoluntarySessionMetrics) -> Self {
        Self {
            session,
            metrics,
            short_window: ShortWindowAverages::default(),
            long_window: LongWindowAverages::default(),
            lactation_number: 0,
            days_in_milk: 0,
        }
    }

    pub fn oid(&self) -> SessionOid {
        self.session.oid
    }

    /// Raw value of a feature; `None` when the source did not report it.
    #[allow(clippy::cast_precision_loss)]
    pub fn value(&self, feature: Feature) -> Option<f64> {
        let s = &self.session;
        let m = &self.metrics;
        match feature {
            Feature::Mdi => m.mdi,
            Feature::TotalYield => s.total_yield,
            Feature::AvgConductivity => s.avg_conductivity,
            Feature::MaxBlood => s.max_blood,
            Feature::MilkFlowDuration => m.milk_flow_duration,
            Feature::SmartPulsationRatio => m.smart_pulsation_ratio,
            Feature::CurrentCombinedAmd => m.current_combined_amd,
            Feature::Incomplete => m.incomplete.map(|v| v as f64),
            Feature::Kickoff => m.kickoff.map(|v| v as f64),
            Feature::ExpectedYield => s.expected_yield,
            Feature::AvgConductivityMa15 => self.short_window.avg_conductivity,
            Feature::MaxBloodMa15 => self.short_window.max_blood,
            Feature::MdiMa15 => self.short_window.mdi,
            Feature::MilkFlowDurationMa15 => self.short_window.milk_flow_duration,
            Feature::SmartPulsationRatioMa15 => self.short_window.smart_pulsation_ratio,
            Feature::CurrentCombinedAmdMa15 => self.short_window.current_combined_amd,
            Feature::TotalYieldMa21 => self.long_window.total_yield,
            Feature::ExpectedYieldMa21 => self.long_window.expected_yield,
            Feature::LactationNumber => Some(self.lactation_number as f64),
            Feature::DaysInMilk => Some(self.days_in_milk as f64),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip_through_lookup() {
        for feature in Feature::CANONICAL_ORDER {
            assert_eq!(Feature::from_name(feature.name()), Some(feature));
        }
        assert_eq!(Feature::from_name("Mdi_ma21"), None);
    }

    #[test]
    fn test_canonical_order_has_no_duplicates() {
        let mut names: Vec<_> = Feature::CANONICAL_ORDER.iter().map(|f| f.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Feature::CANONICAL_ORDER.len());
    }

    #[test]
    fn test_expected_yield_is_averaged_but_not_a_model_input() {
        assert!(!Feature::CANONICAL_ORDER.contains(&Feature::ExpectedYield));
        assert!(Feature::CANONICAL_ORDER.contains(&Feature::ExpectedYieldMa21));
        assert_eq!(Feature::from_name("ExpectedYield"), None);
    }
}
