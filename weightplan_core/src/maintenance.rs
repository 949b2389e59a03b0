//! Maintenance calorie estimation from the weight/calorie log.
//!
//! Fits a linear trend to recent bodyweight, converts the trend into an
//! energy surplus or deficit and subtracts it from average intake:
//! if weight is falling while eating X kcal, maintenance is above X.

use crate::config::{self, EstimatorConfig};
use crate::error::Shortfall;
use crate::history;
use crate::WeightLogEntry;
use chrono::NaiveDate;
use serde::Serialize;

/// Result of a maintenance estimate
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MaintenanceEstimate {
    /// Estimated maintenance in kcal/day
    pub estimate: Option<i32>,
    /// Human-readable reason when no estimate is available
    pub message: Option<String>,
    /// Entries with both weight and calories inside the window
    pub qualifying_count: usize,
    #[serde(skip)]
    pub shortfall: Option<Shortfall>,
}

impl MaintenanceEstimate {
    fn ok(estimate: i32, qualifying_count: usize) -> Self {
        Self {
            estimate: Some(estimate),
            message: None,
            qualifying_count,
            shortfall: None,
        }
    }

    fn unavailable(shortfall: Shortfall, qualifying_count: usize) -> Self {
        Self {
            estimate: None,
            message: Some(shortfall.to_string()),
            qualifying_count,
            shortfall: Some(shortfall),
        }
    }
}

/// Estimate maintenance calories with the default thresholds
pub fn estimate_maintenance(entries: &[WeightLogEntry], today: NaiveDate) -> MaintenanceEstimate {
    MaintenanceEstimator::new(config::defaults().estimator.clone()).estimate(entries, today)
}

/// Trend-regression maintenance estimator
#[derive(Clone, Debug, Default)]
pub struct MaintenanceEstimator {
    config: EstimatorConfig,
}

impl MaintenanceEstimator {
    pub fn new(config: EstimatorConfig) -> Self {
        Self { config }
    }

    /// Estimate maintenance from all entries dated within the trailing window
    /// ending at `today`. Entries may arrive in any order.
    pub fn estimate(&self, entries: &[WeightLogEntry], today: NaiveDate) -> MaintenanceEstimate {
        let cfg = &self.config;
        let window_start = history::window_start(today, cfg.window_days);

        let mut qualifying: Vec<(NaiveDate, f64, i32)> = history::complete_pairs(entries)
            .filter(|(date, _, _)| *date >= window_start && *date <= today)
            .filter(|(_, weight, _)| weight.is_finite())
            .collect();
        qualifying.sort_by_key(|(date, _, _)| *date);

        let count = qualifying.len();
        if count < cfg.min_entries {
            tracing::debug!("Maintenance estimate skipped: {} qualifying entries", count);
            return MaintenanceEstimate::unavailable(
                Shortfall::InsufficientEntries {
                    available: count,
                    required: cfg.min_entries,
                },
                count,
            );
        }

        let (first_date, first_weight, _) = qualifying[0];
        let (last_date, last_weight, _) = qualifying[count - 1];
        let span_days = (last_date - first_date).num_days();
        if span_days < cfg.min_span_days {
            tracing::debug!("Maintenance estimate skipped: {} day span", span_days);
            return MaintenanceEstimate::unavailable(
                Shortfall::InsufficientCoverage {
                    span_days,
                    required_days: cfg.min_span_days,
                },
                count,
            );
        }

        let slope_kg_per_day = if count >= 3 {
            let points: Vec<(f64, f64)> = qualifying
                .iter()
                .map(|(date, weight, _)| ((*date - first_date).num_days() as f64, *weight))
                .collect();
            ols_slope(&points)
        } else {
            (last_weight - first_weight) / span_days as f64
        };

        let trend_kcal_per_day = slope_kg_per_day * cfg.kcal_per_kg;
        let mean_calories =
            qualifying.iter().map(|(_, _, kcal)| f64::from(*kcal)).sum::<f64>() / count as f64;
        let raw = (mean_calories - trend_kcal_per_day).round();

        if !raw.is_finite()
            || raw < cfg.plausible_min_kcal as f64
            || raw > cfg.plausible_max_kcal as f64
        {
            let value = if raw.is_finite() { raw as i64 } else { 0 };
            tracing::warn!(
                "Implausible maintenance estimate {} kcal from {} entries, discarding",
                value,
                count
            );
            return MaintenanceEstimate::unavailable(
                Shortfall::ImplausibleResult {
                    what: "maintenance estimate",
                    value,
                    min: cfg.plausible_min_kcal,
                    max: cfg.plausible_max_kcal,
                },
                count,
            );
        }

        let estimate = raw as i32;
        tracing::debug!(
            "Maintenance estimate {} kcal (mean intake {:.0}, trend {:.4} kg/day, {} entries)",
            estimate,
            mean_calories,
            slope_kg_per_day,
            count
        );
        MaintenanceEstimate::ok(estimate, count)
    }
}

/// Ordinary least-squares slope of y over x; 0 when x has no spread
pub fn ols_slope(points: &[(f64, f64)]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (num, den) = points.iter().fold((0.0, 0.0), |(num, den), (x, y)| {
        let dx = x - mean_x;
        (num + dx * (y - mean_y), den + dx * dx)
    });

    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ShortfallKind;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(offset)
    }

    fn entry(offset: i64, weight: f64, calories: i32) -> WeightLogEntry {
        WeightLogEntry::new(day(offset))
            .with_weight(weight)
            .with_calories(calories)
    }

    #[test]
    fn test_linear_loss_raises_estimate_above_intake() {
        // 8 daily entries, 0.5 kg lost over 7 days, 2200 kcal each day
        let entries: Vec<_> = (0..8)
            .map(|i| entry(i, 80.0 - 0.5 * i as f64 / 7.0, 2200))
            .collect();

        let result = estimate_maintenance(&entries, day(7));

        // slope = -0.5/7 kg/day -> -550 kcal/day trend
        assert_eq!(result.estimate, Some(2750));
        assert_eq!(result.qualifying_count, 8);
        assert!(result.message.is_none());
    }

    #[test]
    fn test_stable_weight_equals_mean_intake() {
        let entries: Vec<_> = (0..10)
            .map(|i| entry(i, 75.0, if i % 2 == 0 { 2400 } else { 2600 }))
            .collect();

        let result = estimate_maintenance(&entries, day(9));
        assert_eq!(result.estimate, Some(2500));
    }

    #[test]
    fn test_two_points_use_endpoint_slope() {
        let entries = vec![entry(0, 80.0, 2000), entry(7, 79.3, 2000)];

        let result = estimate_maintenance(&entries, day(7));

        // -0.1 kg/day -> 770 kcal/day deficit
        assert_eq!(result.estimate, Some(2770));
        assert_eq!(result.qualifying_count, 2);
    }

    #[test]
    fn test_insufficient_entries() {
        let entries = vec![entry(0, 80.0, 2000)];

        let result = estimate_maintenance(&entries, day(0));

        assert!(result.estimate.is_none());
        assert_eq!(result.qualifying_count, 1);
        assert!(result.message.is_some());
        assert_eq!(
            result.shortfall.as_ref().map(|s| s.kind()),
            Some(ShortfallKind::InsufficientData)
        );
    }

    #[test]
    fn test_short_span_is_insufficient() {
        let entries: Vec<_> = (0..5).map(|i| entry(i, 80.0, 2000)).collect();

        let result = estimate_maintenance(&entries, day(4));

        assert!(result.estimate.is_none());
        assert_eq!(result.qualifying_count, 5);
        assert!(matches!(
            result.shortfall,
            Some(Shortfall::InsufficientCoverage { span_days: 4, .. })
        ));
        assert!(result.message.unwrap().contains("≥7 days"));
    }

    #[test]
    fn test_old_and_partial_entries_ignored() {
        let mut entries: Vec<_> = (0..8).map(|i| entry(i + 20, 80.0, 2300)).collect();
        // Outside the trailing window
        entries.push(entry(0, 90.0, 900));
        // Missing calories
        entries.push(WeightLogEntry::new(day(24)).with_weight(60.0));

        let result = estimate_maintenance(&entries, day(27));

        assert_eq!(result.qualifying_count, 8);
        assert_eq!(result.estimate, Some(2300));
    }

    #[test]
    fn test_unsorted_input_is_sorted() {
        let mut entries: Vec<_> = (0..8)
            .map(|i| entry(i, 80.0 - 0.5 * i as f64 / 7.0, 2200))
            .collect();
        entries.reverse();

        assert_eq!(estimate_maintenance(&entries, day(7)).estimate, Some(2750));
    }

    #[test]
    fn test_near_zero_calories_is_implausible() {
        let entries: Vec<_> = (0..8).map(|i| entry(i, 80.0, 10)).collect();

        let result = estimate_maintenance(&entries, day(7));

        assert!(result.estimate.is_none());
        assert_eq!(
            result.shortfall.as_ref().map(|s| s.kind()),
            Some(ShortfallKind::ImplausibleResult)
        );
    }

    #[test]
    fn test_custom_thresholds() {
        let estimator = MaintenanceEstimator::new(EstimatorConfig {
            min_span_days: 3,
            ..EstimatorConfig::default()
        });
        let entries: Vec<_> = (0..4).map(|i| entry(i, 80.0, 2100)).collect();

        assert_eq!(estimator.estimate(&entries, day(3)).estimate, Some(2100));
    }

    #[test]
    fn test_ols_slope_flat_x() {
        assert_eq!(ols_slope(&[(1.0, 2.0), (1.0, 5.0)]), 0.0);
        assert_eq!(ols_slope(&[]), 0.0);
        assert!((ols_slope(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]) - 2.0).abs() < 1e-12);
    }
}
