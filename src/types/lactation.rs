//! Lactation summaries used for days-in-milk context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::AnimalOid;

/// One lactation of one animal. An animal accumulates one row per lactation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LactationSummary {
    pub animal: Option<AnimalOid>,
    pub lactation_number: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
}

/// The lactation selected as "current" for an animal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentLactation {
    pub lactation_number: Option<i64>,
    pub start_date: Option<DateTime<Utc>>,
}
