//! Drift detection and correction segments.
//!
//! When the observed weight trend drifts far enough from the planned rate,
//! a new immutable [`CorrectionSegment`] is appended to the goal's history.
//! Together with the goal's own start point the segments form a piecewise
//! calorie/weight timeline (see [`crate::timeline`]).
//!
//! ## Evaluation
//!
//! 1. **Baseline**: the last segment's end point, or the first weigh-in on
//!    or after the goal's start date
//! 2. **Gates**: enough post-baseline data, long enough span, cooldown since
//!    the baseline, and a usable trailing window
//! 3. **Planned rate**: the goal projected from the baseline weight
//! 4. **Deviation**: observed window rate vs planned, relative
//! 5. **Emit** when outside tolerance and the recomputed calorie target is sane
//!
//! Holding is the normal, frequent outcome.

use crate::config::{self, CorrectionConfig, ProjectionConfig};
use crate::history;
use crate::projection::GoalProjector;
use crate::store::SegmentStore;
use crate::{
    CorrectionSegment, Goal, ProjectionOverrides, Result, SegmentProvenance, WeightLogEntry,
};
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

/// Point a correction is measured from
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Baseline {
    pub date: NaiveDate,
    pub weight_kg: f64,
}

/// Why no segment was emitted
#[derive(Clone, Debug, PartialEq)]
pub enum HoldReason {
    NoWeighedEntries,
    TooFewEntries { available: usize },
    SpanTooShort { span_days: i64 },
    Cooldown { days_since_baseline: i64 },
    WindowTooThin { entries: usize, span_days: i64 },
    ZeroPlannedRate,
    WithinTolerance { deviation: f64 },
    TargetCaloriesUnavailable,
    TargetCaloriesImplausible { value: i64 },
}

/// Outcome of one evaluation
#[derive(Clone, Debug, PartialEq)]
pub enum Decision {
    Emit(CorrectionSegment),
    Hold(HoldReason),
}

/// Evaluate with default thresholds, appending a segment when warranted
pub fn maybe_generate_correction_segment(
    goal: &Goal,
    entries: &[WeightLogEntry],
    maintenance: Option<i32>,
    store: &dyn SegmentStore,
) -> Result<Option<CorrectionSegment>> {
    let defaults = config::defaults();
    CorrectionGenerator::new(defaults.correction.clone(), defaults.projection.clone())
        .maybe_generate(goal, entries, maintenance, store)
}

/// Correction segment generator
#[derive(Clone, Debug, Default)]
pub struct CorrectionGenerator {
    config: CorrectionConfig,
    projector: GoalProjector,
}

impl CorrectionGenerator {
    pub fn new(config: CorrectionConfig, projection: ProjectionConfig) -> Self {
        Self {
            config,
            projector: GoalProjector::new(projection),
        }
    }

    /// Evaluate against the stored history and append the segment if one is due.
    ///
    /// Store failures are returned as errors, never as "no correction".
    pub fn maybe_generate(
        &self,
        goal: &Goal,
        entries: &[WeightLogEntry],
        maintenance: Option<i32>,
        store: &dyn SegmentStore,
    ) -> Result<Option<CorrectionSegment>> {
        let existing = store.list_for_goal(goal.id)?;

        let segment = match self.evaluate(goal, entries, maintenance, &existing) {
            Decision::Emit(segment) => segment,
            Decision::Hold(reason) => {
                tracing::debug!("No correction for goal {}: {:?}", goal.id, reason);
                return Ok(None);
            }
        };

        if already_recorded(&existing, &segment) {
            tracing::debug!(
                "Correction for {} to {} already recorded, skipping",
                segment.start_date,
                segment.end_date
            );
            return Ok(None);
        }

        store.append(segment.clone())?;
        Ok(Some(segment))
    }

    /// Decide whether a new segment is due, given the goal's existing segments.
    pub fn evaluate(
        &self,
        goal: &Goal,
        entries: &[WeightLogEntry],
        maintenance: Option<i32>,
        existing: &[CorrectionSegment],
    ) -> Decision {
        let cfg = &self.config;

        let Some(baseline) = baseline(goal.start_date(), entries, existing) else {
            return Decision::Hold(HoldReason::NoWeighedEntries);
        };

        let mut after: Vec<(NaiveDate, f64)> = history::complete_pairs(entries)
            .filter(|(date, weight, _)| *date > baseline.date && weight.is_finite())
            .map(|(date, weight, _)| (date, weight))
            .collect();
        after.sort_by_key(|(date, _)| *date);

        let (Some(&(first_date, _)), Some(&(latest_date, _))) = (after.first(), after.last()) else {
            return Decision::Hold(HoldReason::TooFewEntries { available: 0 });
        };
        if after.len() < 2 {
            return Decision::Hold(HoldReason::TooFewEntries {
                available: after.len(),
            });
        }

        let span_days = (latest_date - first_date).num_days();
        if span_days < cfg.min_span_days {
            return Decision::Hold(HoldReason::SpanTooShort { span_days });
        }

        let days_since_baseline = (latest_date - baseline.date).num_days();
        if days_since_baseline < cfg.cooldown_days {
            return Decision::Hold(HoldReason::Cooldown {
                days_since_baseline,
            });
        }

        let window = trailing_window(&after, latest_date, cfg);
        let window_span = match (window.first(), window.last()) {
            (Some(first), Some(last)) => (last.0 - first.0).num_days(),
            _ => 0,
        };
        if window.len() < 2 || window_span < cfg.window_min_span_days {
            return Decision::Hold(HoldReason::WindowTooThin {
                entries: window.len(),
                span_days: window_span,
            });
        }
        let (window_first, window_last) = (window[0], window[window.len() - 1]);

        // Anchor the plan at the baseline, not at the already-drifted window
        let projection = self.projector.project(
            Some(goal),
            baseline.weight_kg,
            maintenance,
            &ProjectionOverrides::default(),
            baseline.date,
        );
        let planned = projection.rate_kg_per_week;
        if planned == 0.0 {
            return Decision::Hold(HoldReason::ZeroPlannedRate);
        }

        let actual = (window_last.1 - window_first.1) / window_span as f64 * 7.0;
        let deviation = (actual - planned).abs() / planned.abs();
        if deviation <= cfg.deviation_tolerance {
            return Decision::Hold(HoldReason::WithinTolerance { deviation });
        }

        let Some(target_calories) = projection.target_calories else {
            return Decision::Hold(HoldReason::TargetCaloriesUnavailable);
        };
        if target_calories < cfg.min_target_kcal || target_calories > cfg.max_target_kcal {
            tracing::warn!(
                "Recomputed target of {} kcal for goal {} is implausible, not correcting",
                target_calories,
                goal.id
            );
            return Decision::Hold(HoldReason::TargetCaloriesImplausible {
                value: target_calories,
            });
        }

        tracing::info!(
            "Goal {} off track: {:.2} kg/week observed vs {:.2} planned ({:.0}% deviation)",
            goal.id,
            actual,
            planned,
            deviation * 100.0
        );

        Decision::Emit(CorrectionSegment {
            id: Uuid::new_v4(),
            goal_id: goal.id,
            start_date: window_first.0,
            end_date: window_last.0,
            start_weight_kg: window_first.1,
            end_weight_kg: window_last.1,
            rate_per_week: actual,
            target_calories,
            provenance: SegmentProvenance::Engine,
            created_at: Utc::now(),
        })
    }
}

/// End of the last segment, or the first weigh-in from `goal_start` on
/// when there is none
pub fn baseline(
    goal_start: NaiveDate,
    entries: &[WeightLogEntry],
    existing: &[CorrectionSegment],
) -> Option<Baseline> {
    if let Some(last) = existing.last() {
        return Some(Baseline {
            date: last.end_date,
            weight_kg: last.end_weight_kg,
        });
    }
    entries
        .iter()
        .filter(|e| e.date >= goal_start)
        .filter_map(|e| e.weight_kg.map(|weight_kg| Baseline { date: e.date, weight_kg }))
        .min_by_key(|b| b.date)
}

/// True when the latest stored segment covers the same window as `candidate`
pub fn already_recorded(existing: &[CorrectionSegment], candidate: &CorrectionSegment) -> bool {
    existing
        .last()
        .is_some_and(|last| last.same_window(candidate))
}

/// Most recent entries within the window ending at `latest`, capped in count
fn trailing_window(
    sorted: &[(NaiveDate, f64)],
    latest: NaiveDate,
    cfg: &CorrectionConfig,
) -> Vec<(NaiveDate, f64)> {
    let window_start = history::window_start(latest, cfg.window_days);
    let in_window: Vec<_> = sorted
        .iter()
        .copied()
        .filter(|(date, _)| *date >= window_start && *date <= latest)
        .collect();
    let skip = in_window.len().saturating_sub(cfg.window_max_entries);
    in_window.into_iter().skip(skip).collect()
}
