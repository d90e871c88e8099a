//! Join & Feature Engine
//!
//! Inner-joins sessions with their voluntary metrics, orders each animal's
//! sessions chronologically and computes trailing rolling means within each
//! animal's own sequence.

use std::collections::HashMap;
use std::ops::Range;

use crate::config::FeatureConfig;
use crate::types::{Feature, FeatureRow, MilkingSession, SessionOid, VoluntarySessionMetrics};

/// Columns averaged over the short window.
pub const SHORT_WINDOW_SOURCES: [Feature; 6] = [
    Feature::AvgConductivity,
    Feature::MaxBlood,
    Feature::Mdi,
    Feature::MilkFlowDuration,
    Feature::SmartPulsationRatio,
    Feature::CurrentCombinedAmd,
];

/// Columns averaged over the long window.
pub const LONG_WINDOW_SOURCES: [Feature; 2] = [Feature::TotalYield, Feature::ExpectedYield];

#[derive(Debug, Clone)]
pub struct FeatureEngine {
    short_window: usize,
    long_window: usize,
}

impl FeatureEngine {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            short_window: config.short_window.max(1),
            long_window: config.long_window.max(1),
        }
    }

    /// Join, sort and compute rolling averages in one pass.
    pub fn build(
        &self,
        sessions: Vec<MilkingSession>,
        metrics: Vec<VoluntarySessionMetrics>,
    ) -> Vec<FeatureRow> {
        let mut rows = inner_join(sessions, metrics);
        sort_by_animal_and_time(&mut rows);
        self.apply_rolling_means(&mut rows);
        rows
    }

    /// Fill the short and long window averages of rows already sorted by
    /// [`sort_by_animal_and_time`]. Rows without an animal get none.
    pub fn apply_rolling_means(&self, rows: &mut [FeatureRow]) {
        for range in animal_groups(rows) {
            let group = &mut rows[range];

            for source in SHORT_WINDOW_SOURCES {
                let values: Vec<Option<f64>> = group.iter().map(|r| r.value(source)).collect();
                for (row, mean) in group.iter_mut().zip(trailing_mean(&values, self.short_window)) {
                    set_short_average(row, source, mean);
                }
            }

            for source in LONG_WINDOW_SOURCES {
                let values: Vec<Option<f64>> = group.iter().map(|r| r.value(source)).collect();
                for (row, mean) in group.iter_mut().zip(trailing_mean(&values, self.long_window)) {
                    set_long_average(row, source, mean);
                }
            }
        }
    }
}

/// Inner join on session id. Sessions without metrics are dropped; when the
/// metrics contain the same id twice the first row is used.
pub fn inner_join(
    sessions: Vec<MilkingSession>,
    metrics: Vec<VoluntarySessionMetrics>,
) -> Vec<FeatureRow> {
    let mut by_oid: HashMap<SessionOid, VoluntarySessionMetrics> = HashMap::with_capacity(metrics.len());
    for m in metrics {
        by_oid.entry(m.oid).or_insert(m);
    }

    sessions
        .into_iter()
        .filter_map(|s| by_oid.get(&s.oid).cloned().map(|m| FeatureRow::joined(s, m)))
        .collect()
}

/// Stable sort by (animal, begin time); rows without an animal go last.
pub fn sort_by_animal_and_time(rows: &mut [FeatureRow]) {
    rows.sort_by_key(|r| (r.session.animal.is_none(), r.session.animal, r.session.begin_time));
}

/// Mean of the last `min(window, i + 1)` values ending at each position.
///
/// Missing and NaN values are skipped; a position whose window holds no
/// value at all yields `None`. Infinite values propagate.
#[allow(clippy::cast_precision_loss)]
pub fn trailing_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    let window = window.max(1);
    (0..values.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            let (sum, count) = values[start..=i]
                .iter()
                .flatten()
                .filter(|v| !v.is_nan())
                .fold((0.0, 0_usize), |(sum, count), v| (sum + v, count + 1));
            (count > 0).then(|| sum / count as f64)
        })
        .collect()
}

/// Contiguous ranges of rows sharing the same (present) animal id.
fn animal_groups(rows: &[FeatureRow]) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    let mut start = 0;
    while start < rows.len() {
        let animal = rows[start].session.animal;
        let len = rows[start..]
            .iter()
            .take_while(|r| r.session.animal == animal)
            .count();
        if animal.is_some() {
            groups.push(start..start + len);
        }
        start += len;
    }
    groups
}

fn set_short_average(row: &mut FeatureRow, source: Feature, mean: Option<f64>) {
    let avgs = &mut row.short_window;
    match source {
        Feature::AvgConductivity => avgs.avg_conductivity = mean,
        Feature::MaxBlood => avgs.max_blood = mean,
        Feature::Mdi => avgs.mdi = mean,
        Feature::MilkFlowDuration => avgs.milk_flow_duration = mean,
        Feature::SmartPulsationRatio => avgs.smart_pulsation_ratio = mean,
        Feature::CurrentCombinedAmd => avgs.current_combined_amd = mean,
        _ => {}
    }
}

fn set_long_average(row: &mut FeatureRow, source: Feature, mean: Option<f64>) {
    let avgs = &mut row.long_window;
    match source {
        Feature::TotalYield => avgs.total_yield = mean,
        Feature::ExpectedYield => avgs.expected_yield = mean,
        _ => {}
    }
}
