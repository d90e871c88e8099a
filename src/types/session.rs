//! Milking-session telemetry as returned by the tabular store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session identifier (`OID`), unique per farm.
pub type SessionOid = i64;

/// Animal identifier (`BasicAnimal` on sessions, `Animal` on lactations).
pub type AnimalOid = i64;

/// One milking session, created by upstream ingestion and read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilkingSession {
    /// Session identifier, join key for the voluntary metrics
    pub oid: SessionOid,
    /// Session start
    pub begin_time: DateTime<Utc>,
    /// Session end (not always reported by the milking device)
    pub end_time: Option<DateTime<Utc>>,
    /// Owning animal
    pub animal: Option<AnimalOid>,
    /// Total milk yield (kg)
    pub total_yield: Option<f64>,
    /// Expected milk yield (kg)
    pub expected_yield: Option<f64>,
    /// Average conductivity across quarters (mS/cm)
    pub avg_conductivity: Option<f64>,
    /// Maximum blood indicator across quarters
    pub max_blood: Option<f64>,
}

impl MilkingSession {
    /// Bare session with only the identifying fields set.
    pub fn new(oid: SessionOid, animal: Option<AnimalOid>, begin_time: DateTime<Utc>) -> Self {
        Self {
            oid,
            begin_time,
            end_time: None,
            animal,
            total_yield: None,
            expected_yield: None,
            avg_conductivity: None,
            max_blood: None,
        }
    }
}

/// Device-derived metrics for a voluntary (robot) session, keyed by the
/// same `OID` as [`MilkingSession`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VoluntarySessionMetrics {
    pub oid: SessionOid,
    /// Mastitis detection index
    pub mdi: Option<f64>,
    /// Milk flow duration (s)
    pub milk_flow_duration: Option<f64>,
    /// Smart pulsation ratio
    pub smart_pulsation_ratio: Option<f64>,
    /// Combined anomaly metric reported by the device
    pub current_combined_amd: Option<f64>,
    /// Incomplete milking flag
    pub incomplete: Option<i64>,
    /// Kickoff flag
    pub kickoff: Option<i64>,
}

impl VoluntarySessionMetrics {
    pub fn new(oid: SessionOid) -> Self {
        Self {
            oid,
            ..Self::default()
        }
    }
}
