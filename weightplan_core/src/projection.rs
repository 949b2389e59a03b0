//! Goal projection: turn a goal into a weight and calorie trajectory.
//!
//! The three ways of specifying a goal (target date, weekly rate, duration)
//! are normalized into one signed weekly rate, from which duration, final
//! weight, goal date and calorie targets are derived.
//!
//! Projection is pure. Unsaved edits are previewed by passing
//! [`ProjectionOverrides`], never by mutating the goal.

use crate::config::{self, ProjectionConfig};
use crate::error::Shortfall;
use crate::{Goal, GoalProjection, ProjectionOverrides, RateSpec, TimeMode};
use chrono::{Duration, NaiveDate};

/// Project a goal with the default configuration
pub fn project(
    goal: Option<&Goal>,
    current_weight_kg: f64,
    maintenance: Option<i32>,
    overrides: &ProjectionOverrides,
    today: NaiveDate,
) -> GoalProjection {
    GoalProjector::new(config::defaults().projection.clone()).project(
        goal,
        current_weight_kg,
        maintenance,
        overrides,
        today,
    )
}

/// Goal-to-trajectory projector
#[derive(Clone, Debug, Default)]
pub struct GoalProjector {
    config: ProjectionConfig,
}

/// Collects the reasons fields degraded to null, without repeats
#[derive(Default)]
struct Gaps(Vec<Shortfall>);

impl Gaps {
    fn push(&mut self, gap: Shortfall) {
        if !self.0.contains(&gap) {
            self.0.push(gap);
        }
    }
}

impl GoalProjector {
    pub fn new(config: ProjectionConfig) -> Self {
        Self { config }
    }

    /// Derive the full trajectory for `goal` starting from `current_weight_kg` on `today`.
    pub fn project(
        &self,
        goal: Option<&Goal>,
        current_weight_kg: f64,
        maintenance: Option<i32>,
        overrides: &ProjectionOverrides,
        today: NaiveDate,
    ) -> GoalProjection {
        let Some(goal) = goal else {
            return GoalProjection {
                gaps: vec![Shortfall::NoActiveGoal],
                ..GoalProjection::default()
            };
        };

        let mut gaps = Gaps::default();

        if !current_weight_kg.is_finite() || current_weight_kg <= 0.0 {
            gaps.push(Shortfall::InvalidField {
                field: "current weight",
                detail: format!("{} kg", current_weight_kg),
            });
            let target_calories = self.target_calories(maintenance, None, &mut gaps);
            return GoalProjection {
                target_calories,
                gaps: gaps.0,
                ..GoalProjection::default()
            };
        }

        let target_weight = goal.target_weight_kg.filter(|w| w.is_finite());
        let target_date = overrides.target_date.or(goal.target_date);
        let duration_input = overrides.duration_weeks.or(goal.duration_weeks);
        let weeks_until = target_date.map(|d| (d - today).num_days() as f64 / 7.0);

        let rate = self.signed_rate(
            goal,
            target_weight,
            weeks_until,
            current_weight_kg,
            overrides,
            &mut gaps,
        );

        let duration_weeks = match goal.time_mode {
            TimeMode::ByRate => match target_weight {
                None => {
                    gaps.push(Shortfall::MissingField { field: "target weight" });
                    None
                }
                Some(_) if rate == 0.0 => {
                    gaps.push(Shortfall::ZeroRate);
                    None
                }
                Some(target) => Some((target - current_weight_kg).abs() / rate.abs()),
            },
            TimeMode::ByDate => weeks_until.filter(|w| *w > 0.0),
            TimeMode::ByDuration => match duration_input {
                Some(weeks) if weeks > 0 => Some(f64::from(weeks)),
                Some(weeks) => {
                    gaps.push(Shortfall::InvalidField {
                        field: "duration",
                        detail: format!("{} weeks is not positive", weeks),
                    });
                    None
                }
                None => {
                    gaps.push(Shortfall::MissingField { field: "duration" });
                    None
                }
            },
        };

        let final_weight_kg = match goal.time_mode {
            TimeMode::ByDuration => duration_weeks.map(|weeks| current_weight_kg + rate * weeks),
            TimeMode::ByDate | TimeMode::ByRate => target_weight,
        };

        let weight_change_kg = if rate == 0.0 {
            gaps.push(Shortfall::ZeroRate);
            None
        } else {
            duration_weeks.map(|weeks| rate * weeks)
        };

        let goal_date = match goal.time_mode {
            TimeMode::ByDate => target_date,
            TimeMode::ByRate if rate == 0.0 || target_weight.is_none() => None,
            TimeMode::ByRate | TimeMode::ByDuration => {
                duration_weeks.and_then(|weeks| add_weeks(today, weeks))
            }
        };

        let total_calories = weight_change_kg
            .map(|change| (change * self.config.kcal_per_kg).round())
            .and_then(|total| to_i64(total, "total calories", &mut gaps));

        let days = match (goal.time_mode, target_date) {
            (TimeMode::ByDate, Some(date)) if duration_weeks.is_some() => {
                Some((date - today).num_days())
            }
            _ => duration_weeks
                .map(|weeks| (weeks * 7.0 + DAY_EPSILON).floor())
                .and_then(|days| to_i64(days, "duration", &mut gaps)),
        };

        let daily_calorie_delta = match (total_calories, days) {
            (Some(total), Some(days)) if days > 0 => Some(total / days),
            _ => None,
        };

        let target_calories = self.target_calories(maintenance, daily_calorie_delta, &mut gaps);

        GoalProjection {
            rate_kg_per_week: rate,
            duration_weeks,
            goal_date,
            final_weight_kg,
            weight_change_kg,
            total_calories,
            daily_calorie_delta,
            target_calories,
            gaps: gaps.0,
        }
    }

    fn signed_rate(
        &self,
        goal: &Goal,
        target_weight: Option<f64>,
        weeks_until: Option<f64>,
        current_weight_kg: f64,
        overrides: &ProjectionOverrides,
        gaps: &mut Gaps,
    ) -> f64 {
        match goal.time_mode {
            TimeMode::ByDate => match (target_weight, weeks_until) {
                (None, _) => {
                    gaps.push(Shortfall::MissingField { field: "target weight" });
                    0.0
                }
                (_, None) => {
                    gaps.push(Shortfall::MissingField { field: "target date" });
                    0.0
                }
                (Some(_), Some(weeks)) if weeks <= 0.0 => {
                    gaps.push(Shortfall::InvalidField {
                        field: "target date",
                        detail: "not in the future".into(),
                    });
                    0.0
                }
                (Some(target), Some(weeks)) => (target - current_weight_kg) / weeks,
            },
            TimeMode::ByRate | TimeMode::ByDuration => {
                let sign = match target_weight {
                    Some(target) if target < current_weight_kg => -1.0,
                    Some(target) if target > current_weight_kg => 1.0,
                    Some(_) => 0.0,
                    None => goal.archetype.direction(),
                };
                match rate_magnitude(&goal.rate, current_weight_kg, overrides, gaps) {
                    Some(magnitude) => magnitude * sign,
                    None => 0.0,
                }
            }
        }
    }

    fn target_calories(
        &self,
        maintenance: Option<i32>,
        daily_calorie_delta: Option<i64>,
        gaps: &mut Gaps,
    ) -> Option<i64> {
        match maintenance {
            Some(maintenance) => {
                let target = i64::from(maintenance).checked_add(daily_calorie_delta.unwrap_or(0));
                if target.is_none() {
                    gaps.push(Shortfall::InvalidField {
                        field: "target calories",
                        detail: "out of range".into(),
                    });
                }
                target
            }
            None => {
                gaps.push(Shortfall::MissingMaintenance);
                None
            }
        }
    }
}

/// Unsigned kg/week implied by the rate spec at the given weight
fn rate_magnitude(
    rate: &RateSpec,
    current_weight_kg: f64,
    overrides: &ProjectionOverrides,
    gaps: &mut Gaps,
) -> Option<f64> {
    let value = match rate {
        RateSpec::Flat { kg_per_week } => rate_value(*kg_per_week, overrides, gaps)?,
        RateSpec::PercentBodyweight { percent_per_week } => {
            rate_value(*percent_per_week, overrides, gaps)? / 100.0 * current_weight_kg
        }
        RateSpec::Preset { preset } => preset.fraction_per_week() * current_weight_kg,
    };
    Some(value.abs())
}

/// The stored rate value, or the previewed text when one is given
fn rate_value(stored: f64, overrides: &ProjectionOverrides, gaps: &mut Gaps) -> Option<f64> {
    let value = match overrides.rate_text.as_deref() {
        Some(text) => match text.trim().parse::<f64>() {
            Ok(parsed) => parsed,
            Err(_) => {
                gaps.push(Shortfall::InvalidField {
                    field: "rate",
                    detail: format!("{:?} is not a number", text),
                });
                return None;
            }
        },
        None => stored,
    };

    if value.is_finite() {
        Some(value)
    } else {
        gaps.push(Shortfall::InvalidField {
            field: "rate",
            detail: "not a finite number".into(),
        });
        None
    }
}

/// Absorbs float error in `weeks * 7.0` so whole days are not floored away
const DAY_EPSILON: f64 = 1e-9;

/// Whole-number f64 to i64, or a gap when it is not finite or out of range
fn to_i64(value: f64, field: &'static str, gaps: &mut Gaps) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    if value.is_finite() && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        gaps.push(Shortfall::InvalidField {
            field,
            detail: format!("{} is out of range", value),
        });
        None
    }
}

fn add_weeks(date: NaiveDate, weeks: f64) -> Option<NaiveDate> {
    let days = (weeks * 7.0).round();
    if !days.is_finite() || days.abs() > i64::MAX as f64 {
        return None;
    }
    Duration::try_days(days as i64).and_then(|d| date.checked_add_signed(d))
}
