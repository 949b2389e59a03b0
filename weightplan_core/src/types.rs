//! Core domain types for the weight plan system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Daily weight/calorie log entries and their provenance
//! - Goals, their time modes and rate specifications
//! - Derived goal projections
//! - Correction segments forming the piecewise goal timeline

use crate::error::{Error, Result, Shortfall};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Log Types
// ============================================================================

/// Where a logged value came from
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntrySource {
    Manual,
    Synced { source: String },
}

/// One calendar day of the weight/calorie log
///
/// The log holds at most one entry per date; writes are upserts keyed by day.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WeightLogEntry {
    pub date: NaiveDate,
    pub weight_kg: Option<f64>,
    #[serde(default)]
    pub weight_source: Option<EntrySource>,
    pub calories: Option<i32>,
    #[serde(default)]
    pub calories_source: Option<EntrySource>,
}

impl WeightLogEntry {
    /// Create an empty entry for a day
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            weight_kg: None,
            weight_source: None,
            calories: None,
            calories_source: None,
        }
    }

    /// Set a manually entered weight
    pub fn with_weight(mut self, weight_kg: f64) -> Self {
        self.weight_kg = Some(weight_kg);
        self.weight_source = Some(EntrySource::Manual);
        self
    }

    /// Set a manually entered calorie intake
    pub fn with_calories(mut self, calories: i32) -> Self {
        self.calories = Some(calories);
        self.calories_source = Some(EntrySource::Manual);
        self
    }

    /// Weight and calories, if both were logged for this day
    pub fn weight_and_calories(&self) -> Option<(f64, i32)> {
        match (self.weight_kg, self.calories) {
            (Some(w), Some(c)) => Some((w, c)),
            _ => None,
        }
    }

    /// Reject entries no source should produce: no values, a weight that is
    /// not a positive finite number, or negative calories
    pub fn validate(&self) -> Result<()> {
        if let Some(weight) = self.weight_kg {
            if !weight.is_finite() || weight <= 0.0 {
                return Err(Error::Entry(format!("weight {} on {}", weight, self.date)));
            }
        }
        if let Some(calories) = self.calories {
            if calories < 0 {
                return Err(Error::Entry(format!(
                    "negative calories {} on {}",
                    calories, self.date
                )));
            }
        }
        if self.weight_kg.is_none() && self.calories.is_none() {
            return Err(Error::Entry(format!("nothing logged for {}", self.date)));
        }
        Ok(())
    }

    /// Merge another record for the same day into this one.
    ///
    /// Values present in `other` win; absent values keep what was already logged.
    pub fn merge(&mut self, other: WeightLogEntry) {
        if other.weight_kg.is_some() {
            self.weight_kg = other.weight_kg;
            self.weight_source = other.weight_source;
        }
        if other.calories.is_some() {
            self.calories = other.calories;
            self.calories_source = other.calories_source;
        }
    }
}

// ============================================================================
// Goal Types
// ============================================================================

/// What the person is trying to do with their weight
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GoalArchetype {
    TargetWeight,
    Bulk,
    Cut,
    Maintain,
}

impl GoalArchetype {
    /// Direction implied by the archetype alone
    pub fn direction(&self) -> f64 {
        match self {
            GoalArchetype::Bulk => 1.0,
            GoalArchetype::Cut => -1.0,
            GoalArchetype::TargetWeight | GoalArchetype::Maintain => 0.0,
        }
    }
}

/// Which of target date, weekly rate or duration the goal was specified by
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeMode {
    ByDate,
    ByRate,
    ByDuration,
}

/// Named rate presets
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RatePreset {
    Gentle,
    Moderate,
    Aggressive,
}

impl RatePreset {
    /// Fraction of bodyweight changed per week
    pub fn fraction_per_week(&self) -> f64 {
        match self {
            RatePreset::Gentle => 0.0025,
            RatePreset::Moderate => 0.005,
            RatePreset::Aggressive => 0.01,
        }
    }
}

/// Source of the goal's weekly rate magnitude
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RateSpec {
    /// Flat kg per week
    Flat { kg_per_week: f64 },
    /// Percent of current bodyweight per week (0.5 = 0.5%)
    PercentBodyweight { percent_per_week: f64 },
    Preset { preset: RatePreset },
}

/// The active weight plan
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Goal {
    pub id: Uuid,
    pub archetype: GoalArchetype,
    pub time_mode: TimeMode,
    pub target_weight_kg: Option<f64>,
    pub target_date: Option<NaiveDate>,
    pub duration_weeks: Option<i32>,
    pub rate: RateSpec,
    pub created_at: DateTime<Utc>,
    pub baseline_maintenance: Option<i32>,
}

impl Goal {
    /// Create a new goal with a fresh id, stamped now
    pub fn new(archetype: GoalArchetype, time_mode: TimeMode, rate: RateSpec) -> Self {
        Self {
            id: Uuid::new_v4(),
            archetype,
            time_mode,
            target_weight_kg: None,
            target_date: None,
            duration_weeks: None,
            rate,
            created_at: Utc::now(),
            baseline_maintenance: None,
        }
    }

    /// Stamp the goal as created on `date`, keeping the current time of day
    pub fn started_on(mut self, date: NaiveDate) -> Self {
        self.created_at = date.and_time(Utc::now().time()).and_utc();
        self
    }

    /// Day the goal took effect; weigh-ins before it belong to earlier plans
    pub fn start_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }
}

/// Unsaved edits previewed against a goal without persisting it
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProjectionOverrides {
    /// Replaces the numeric payload of a flat or percent rate
    pub rate_text: Option<String>,
    pub duration_weeks: Option<i32>,
    pub target_date: Option<NaiveDate>,
}

// ============================================================================
// Derived Projection
// ============================================================================

/// Trajectory derived from a goal; recomputed on demand, never stored
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct GoalProjection {
    /// Signed kg/week, negative for loss
    pub rate_kg_per_week: f64,
    pub duration_weeks: Option<f64>,
    pub goal_date: Option<NaiveDate>,
    pub final_weight_kg: Option<f64>,
    pub weight_change_kg: Option<f64>,
    pub total_calories: Option<i64>,
    pub daily_calorie_delta: Option<i64>,
    pub target_calories: Option<i64>,
    /// Why each missing field could not be derived
    pub gaps: Vec<Shortfall>,
}

// ============================================================================
// Correction Segments
// ============================================================================

/// Who created a segment
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SegmentProvenance {
    Engine,
    User,
}

/// Immutable, time-bounded recalibration of a goal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CorrectionSegment {
    pub id: Uuid,
    pub goal_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_weight_kg: f64,
    pub end_weight_kg: f64,
    /// Observed kg/week over the segment's window
    pub rate_per_week: f64,
    pub target_calories: i64,
    pub provenance: SegmentProvenance,
    pub created_at: DateTime<Utc>,
}

impl CorrectionSegment {
    /// True when both segments cover the same observed window
    pub fn same_window(&self, other: &CorrectionSegment) -> bool {
        self.start_date == other.start_date
            && self.end_date == other.end_date
            && self.start_weight_kg == other.start_weight_kg
            && self.end_weight_kg == other.end_weight_kg
    }
}
