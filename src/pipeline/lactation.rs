//! Lactation Context Enricher
//!
//! Picks one "current" lactation per animal (the highest lactation number on
//! record) and derives days-in-milk for every feature row of that animal.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::types::{AnimalOid, CurrentLactation, FeatureRow, LactationSummary};

const MILLIS_PER_DAY: i64 = 86_400_000;

pub struct LactationEnricher;

impl LactationEnricher {
    /// Highest-numbered lactation per animal. A numbered lactation always
    /// beats one without a number; summaries without an animal are ignored.
    pub fn current_lactations(
        summaries: &[LactationSummary],
    ) -> HashMap<AnimalOid, CurrentLactation> {
        let mut current: HashMap<AnimalOid, CurrentLactation> = HashMap::new();
        for summary in summaries {
            let Some(animal) = summary.animal else {
                continue;
            };
            let candidate = CurrentLactation {
                lactation_number: summary.lactation_number,
                start_date: summary.start_date,
            };
            current
                .entry(animal)
                .and_modify(|held| {
                    if candidate.lactation_number > held.lactation_number {
                        *held = candidate;
                    }
                })
                .or_insert(candidate);
        }
        current
    }

    /// Set lactation number and days-in-milk on every row.
    ///
    /// Rows whose animal has no summary (or no animal at all) get 0 for both;
    /// a summary without a start date gives 0 days-in-milk.
    pub fn enrich(rows: &mut [FeatureRow], summaries: &[LactationSummary]) {
        let current = Self::current_lactations(summaries);
        for row in rows {
            let lactation = row.session.animal.and_then(|a| current.get(&a));
            row.lactation_number = lactation.and_then(|l| l.lactation_number).unwrap_or(0);
            row.days_in_milk = lactation
                .and_then(|l| l.start_date)
                .map_or(0, |start| days_in_milk(row.session.begin_time, start));
        }
    }
}

/// Whole days from `start` to `at`, rounded down.
pub fn days_in_milk(at: DateTime<Utc>, start: DateTime<Utc>) -> i64 {
    (at - start).num_milliseconds().div_euclid(MILLIS_PER_DAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MilkingSession, VoluntarySessionMetrics};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 20, 6, 30, 0).unwrap()
    }

    fn row(oid: i64, animal: Option<i64>) -> FeatureRow {
        FeatureRow::joined(
            MilkingSession::new(oid, animal, t0()),
            VoluntarySessionMetrics::new(oid),
        )
    }

    fn summary(animal: i64, number: Option<i64>, days_before: i64) -> LactationSummary {
        LactationSummary {
            animal: Some(animal),
            lactation_number: number,
            start_date: Some(t0() - Duration::days(days_before)),
        }
    }

    #[test]
    fn test_highest_lactation_number_wins() {
        let current = LactationEnricher::current_lactations(&[
            summary(1, Some(2), 400),
            summary(1, Some(3), 40),
            summary(1, None, 10),
            summary(1, Some(1), 800),
        ]);
        assert_eq!(current[&1].lactation_number, Some(3));
        assert_eq!(current[&1].start_date, Some(t0() - Duration::days(40)));
    }

    #[test]
    fn test_enrich_sets_number_and_days_in_milk() {
        let mut rows = vec![row(1, Some(1)), row(2, Some(2)), row(3, None)];
        LactationEnricher::enrich(&mut rows, &[summary(1, Some(3), 42)]);

        assert_eq!(rows[0].lactation_number, 3);
        assert_eq!(rows[0].days_in_milk, 42);
        assert_eq!((rows[1].lactation_number, rows[1].days_in_milk), (0, 0));
        assert_eq!((rows[2].lactation_number, rows[2].days_in_milk), (0, 0));
    }

    #[test]
    fn test_missing_start_date_gives_zero_days() {
        let mut rows = vec![row(1, Some(1))];
        let mut s = summary(1, Some(2), 0);
        s.start_date = None;
        LactationEnricher::enrich(&mut rows, &[s]);
        assert_eq!(rows[0].lactation_number, 2);
        assert_eq!(rows[0].days_in_milk, 0);
    }

    #[test]
    fn test_days_in_milk_floors_partial_days() {
        let start = t0();
        assert_eq!(days_in_milk(start + Duration::hours(47), start), 1);
        assert_eq!(days_in_milk(start - Duration::hours(1), start), -1);
    }
}
