//! Piecewise goal timeline.
//!
//! The goal's own starting point plus its correction segments define target
//! calories as a step function of time and target weight as a line that is
//! re-anchored at the end of every segment.

use crate::correction::Baseline;
use crate::{CorrectionSegment, GoalProjection};
use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

/// What a timeline point came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    GoalStart,
    Correction { segment_id: Uuid },
}

/// A step of the timeline, effective from `from` until the next point
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimelinePoint {
    pub from: NaiveDate,
    pub weight_kg: f64,
    pub target_calories: Option<i64>,
    pub anchor: Anchor,
}

/// Target weight and calories over the lifetime of a goal
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GoalTimeline {
    planned_rate_kg_per_week: f64,
    target_weight_kg: Option<f64>,
    points: Vec<TimelinePoint>,
}

impl GoalTimeline {
    /// Build from the goal's starting point, its projection from that point,
    /// and its stored segments
    pub fn build(start: Baseline, plan: &GoalProjection, segments: &[CorrectionSegment]) -> Self {
        let mut points = vec![TimelinePoint {
            from: start.date,
            weight_kg: start.weight_kg,
            target_calories: plan.target_calories,
            anchor: Anchor::GoalStart,
        }];

        let mut ordered: Vec<&CorrectionSegment> = segments.iter().collect();
        ordered.sort_by_key(|s| s.end_date);
        points.extend(
            ordered
                .into_iter()
                .filter(|s| s.end_date >= start.date)
                .map(|s| TimelinePoint {
                    from: s.end_date,
                    weight_kg: s.end_weight_kg,
                    target_calories: Some(s.target_calories),
                    anchor: Anchor::Correction { segment_id: s.id },
                }),
        );

        Self {
            planned_rate_kg_per_week: plan.rate_kg_per_week,
            target_weight_kg: plan.final_weight_kg,
            points,
        }
    }

    pub fn points(&self) -> &[TimelinePoint] {
        &self.points
    }

    fn point_on(&self, date: NaiveDate) -> Option<&TimelinePoint> {
        self.points.iter().rev().find(|p| p.from <= date)
    }

    /// Target daily calories in effect on `date`; `None` before the goal starts
    pub fn calories_on(&self, date: NaiveDate) -> Option<i64> {
        self.point_on(date).and_then(|p| p.target_calories)
    }

    /// Target weight on `date`, never projected past the goal's final weight
    pub fn weight_on(&self, date: NaiveDate) -> Option<f64> {
        let point = self.point_on(date)?;
        let weeks = (date - point.from).num_days() as f64 / 7.0;
        let weight = point.weight_kg + self.planned_rate_kg_per_week * weeks;

        let rate = self.planned_rate_kg_per_week;
        Some(match self.target_weight_kg {
            Some(target) if rate < 0.0 => weight.max(target.min(point.weight_kg)),
            Some(target) if rate > 0.0 => weight.min(target.max(point.weight_kg)),
            _ => weight,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SegmentProvenance;
    use chrono::{Duration, Utc};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap() + Duration::days(offset)
    }

    fn plan() -> GoalProjection {
        GoalProjection {
            rate_kg_per_week: -0.5,
            final_weight_kg: Some(65.0),
            target_calories: Some(1950),
            ..GoalProjection::default()
        }
    }

    fn segment(start: i64, end: i64, end_weight: f64, calories: i64) -> CorrectionSegment {
        CorrectionSegment {
            id: Uuid::new_v4(),
            goal_id: Uuid::new_v4(),
            start_date: day(start),
            end_date: day(end),
            start_weight_kg: 69.5,
            end_weight_kg: end_weight,
            rate_per_week: -1.2,
            target_calories: calories,
            provenance: SegmentProvenance::Engine,
            created_at: Utc::now(),
        }
    }

    fn start() -> Baseline {
        Baseline {
            date: day(0),
            weight_kg: 70.0,
        }
    }

    #[test]
    fn test_plan_only() {
        let timeline = GoalTimeline::build(start(), &plan(), &[]);

        assert_eq!(timeline.calories_on(day(-1)), None);
        assert_eq!(timeline.weight_on(day(-1)), None);
        assert_eq!(timeline.calories_on(day(30)), Some(1950));
        assert_eq!(timeline.weight_on(day(14)), Some(69.0));
    }

    #[test]
    fn test_segments_step_calories_and_reanchor_weight() {
        let segments = vec![segment(5, 18, 67.0, 2100), segment(26, 39, 65.5, 2200)];
        let timeline = GoalTimeline::build(start(), &plan(), &segments);

        assert_eq!(timeline.points().len(), 3);
        assert_eq!(timeline.calories_on(day(17)), Some(1950));
        assert_eq!(timeline.calories_on(day(18)), Some(2100));
        assert_eq!(timeline.calories_on(day(40)), Some(2200));

        assert_eq!(timeline.weight_on(day(18)), Some(67.0));
        assert_eq!(timeline.weight_on(day(25)), Some(66.5));
    }

    #[test]
    fn test_weight_stops_at_target() {
        let timeline = GoalTimeline::build(start(), &plan(), &[]);

        assert_eq!(timeline.weight_on(day(700)), Some(65.0));
    }
}
