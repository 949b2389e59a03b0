//! Log history helpers.
//!
//! Windowing, per-day folding and current-weight selection over the
//! weight/calorie log. Everything here is a pure function of its inputs.

use crate::config::ProjectionConfig;
use crate::WeightLogEntry;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Which data the current weight was derived from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightSource {
    RollingAverage,
    MostRecent,
    Default,
}

/// Current bodyweight chosen for projections
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CurrentWeight {
    pub weight_kg: f64,
    pub source: WeightSource,
}

/// First day of a `days`-long window ending at `end`, saturating at the
/// earliest representable date
pub fn window_start(end: NaiveDate, days: i64) -> NaiveDate {
    Duration::try_days(days.saturating_sub(1))
        .and_then(|span| end.checked_sub_signed(span))
        .unwrap_or(NaiveDate::MIN)
}

/// Days that have both a weight and a calorie figure, as (date, kg, kcal)
pub fn complete_pairs(
    entries: &[WeightLogEntry],
) -> impl Iterator<Item = (NaiveDate, f64, i32)> + '_ {
    entries.iter().filter_map(|e| {
        e.weight_and_calories()
            .map(|(weight, calories)| (e.date, weight, calories))
    })
}

/// Fold entries into one record per day, later records winning field by field.
///
/// Returns entries sorted ascending by date.
pub fn fold_by_day<I>(entries: I) -> Vec<WeightLogEntry>
where
    I: IntoIterator<Item = WeightLogEntry>,
{
    let mut by_day: BTreeMap<NaiveDate, WeightLogEntry> = BTreeMap::new();
    for entry in entries {
        match by_day.get_mut(&entry.date) {
            Some(existing) => existing.merge(entry),
            None => {
                by_day.insert(entry.date, entry);
            }
        }
    }
    by_day.into_values().collect()
}

/// Pick the weight to project from.
///
/// Preference: mean of weights logged in the trailing window ending `today`,
/// then the most recent weight ever logged, then the configured default.
pub fn current_weight(
    entries: &[WeightLogEntry],
    today: NaiveDate,
    config: &ProjectionConfig,
) -> CurrentWeight {
    let window_start = window_start(today, config.rolling_average_days);
    let recent: Vec<f64> = entries
        .iter()
        .filter(|e| e.date >= window_start && e.date <= today)
        .filter_map(|e| e.weight_kg)
        .collect();

    if !recent.is_empty() {
        return CurrentWeight {
            weight_kg: recent.iter().sum::<f64>() / recent.len() as f64,
            source: WeightSource::RollingAverage,
        };
    }

    let latest = entries
        .iter()
        .filter(|e| e.date <= today)
        .filter_map(|e| e.weight_kg.map(|w| (e.date, w)))
        .max_by_key(|(date, _)| *date);

    match latest {
        Some((_, weight_kg)) => CurrentWeight {
            weight_kg,
            source: WeightSource::MostRecent,
        },
        None => CurrentWeight {
            weight_kg: config.default_weight_kg,
            source: WeightSource::Default,
        },
    }
}
