//! Persistence Writer
//!
//! Turns scored rows into master-table records and writes them as one
//! batch. Non-finite floats are nulled here, right before storage.

use tracing::info;

use crate::storage::{PredictionStore, StoreError};
use crate::types::{PredictionRecord, ScoredRow};

/// `None` for NaN and infinities.
pub fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl PredictionRecord {
    pub fn from_scored(farm_id: &str, scored: &ScoredRow) -> Self {
        let f = &scored.features;
        let s = &f.session;
        let m = &f.metrics;
        Self {
            farm_id: farm_id.to_string(),
            session_oid: s.oid,
            animal_oid: s.animal.unwrap_or(0),

            mdi: finite(m.mdi),
            total_yield: finite(s.total_yield),
            avg_conductivity: finite(s.avg_conductivity),
            max_blood: finite(s.max_blood),
            milk_flow_duration: finite(m.milk_flow_duration),
            smart_pulsation_ratio: finite(m.smart_pulsation_ratio),
            current_combined_amd: finite(m.current_combined_amd),
            incomplete: m.incomplete.unwrap_or(0),
            kickoff: m.kickoff.unwrap_or(0),

            avg_conductivity_ma15: finite(f.short_window.avg_conductivity),
            max_blood_ma15: finite(f.short_window.max_blood),
            mdi_ma15: finite(f.short_window.mdi),
            milk_flow_duration_ma15: finite(f.short_window.milk_flow_duration),
            smart_pulsation_ratio_ma15: finite(f.short_window.smart_pulsation_ratio),
            current_combined_amd_ma15: finite(f.short_window.current_combined_amd),
            total_yield_ma21: finite(f.long_window.total_yield),
            expected_yield_ma21: finite(f.long_window.expected_yield),

            lactation_number: f.lactation_number,
            days_in_milk: f.days_in_milk,

            begin_time: s.begin_time,
            end_time: s.end_time,

            predicted_mdi: finite(Some(scored.predicted_mdi)),
            mastitis_probability: finite(Some(scored.probability)),
        }
    }
}

pub struct PersistenceWriter;

impl PersistenceWriter {
    pub fn records(farm_id: &str, scored: &[ScoredRow]) -> Vec<PredictionRecord> {
        scored
            .iter()
            .map(|row| PredictionRecord::from_scored(farm_id, row))
            .collect()
    }

    /// Insert all records in one batch. An empty batch issues no write.
    pub async fn write(
        store: &dyn PredictionStore,
        records: &[PredictionRecord],
    ) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        store.insert_predictions(records).await?;
        info!(rows = records.len(), backend = store.backend_name(), "Saved predictions");
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use crate::types::{FeatureRow, MilkingSession, VoluntarySessionMetrics};
    use chrono::{TimeZone, Utc};

    fn scored(predicted_mdi: f64, probability: f64) -> ScoredRow {
        let begin = Utc.with_ymd_and_hms(2025, 11, 20, 6, 0, 0).unwrap();
        let mut session = MilkingSession::new(11, Some(4), begin);
        session.total_yield = Some(f64::INFINITY);
        session.avg_conductivity = Some(5.5);
        let metrics = VoluntarySessionMetrics {
            mdi: Some(f64::NAN),
            kickoff: Some(1),
            ..VoluntarySessionMetrics::new(11)
        };
        let mut features = FeatureRow::joined(session, metrics);
        features.short_window.mdi = Some(f64::NEG_INFINITY);
        features.long_window.total_yield = Some(20.0);
        ScoredRow {
            features,
            predicted_mdi,
            probability,
        }
    }

    #[test]
    fn test_non_finite_values_become_null() {
        let record = PredictionRecord::from_scored("farm", &scored(f64::NAN, f64::INFINITY));
        assert_eq!(record.mdi, None);
        assert_eq!(record.total_yield, None);
        assert_eq!(record.mdi_ma15, None);
        assert_eq!(record.predicted_mdi, None);
        assert_eq!(record.mastitis_probability, None);
        assert_eq!(record.avg_conductivity, Some(5.5));
        assert_eq!(record.total_yield_ma21, Some(20.0));
    }

    #[test]
    fn test_integer_fields_default_to_zero() {
        let record = PredictionRecord::from_scored("farm", &scored(1.0, 0.5));
        assert_eq!(record.animal_oid, 4);
        assert_eq!(record.incomplete, 0);
        assert_eq!(record.kickoff, 1);
        assert_eq!(record.lactation_number, 0);
    }

    #[test]
    fn test_serialized_record_has_no_non_finite_numbers() {
        let record = PredictionRecord::from_scored("farm", &scored(f64::NAN, 0.2));
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["Mdi"].is_null());
        assert!(json["mdi_2d"].is_null());
        assert!((json["prob_mastitis"].as_f64().unwrap() - 0.2).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_empty_batch_is_noop() {
        let store = InMemoryStore::new();
        assert_eq!(PersistenceWriter::write(&store, &[]).await.unwrap(), 0);
        assert_eq!(store.call_log().insert_batches, 0);
    }

    #[tokio::test]
    async fn test_single_batch_insert() {
        let store = InMemoryStore::new();
        let records = PersistenceWriter::records("farm", &[scored(1.0, 0.3), scored(2.0, 0.4)]);
        assert_eq!(PersistenceWriter::write(&store, &records).await.unwrap(), 2);
        assert_eq!(store.call_log().insert_batches, 1);
        assert_eq!(store.predictions().len(), 2);
    }
}
