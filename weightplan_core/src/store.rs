//! Store interfaces consumed by the correction engine.
//!
//! The engine only reads the log and goal, and only appends segments.
//! File-backed implementations live in [`crate::wal`] and [`crate::state`];
//! the in-memory implementations here back tests and embedding callers.

use crate::{CorrectionSegment, Error, Goal, Result, WeightLogEntry};
use chrono::NaiveDate;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

/// Per-day weight/calorie log
pub trait WeightLogStore: Send + Sync {
    /// Entries on or after `since` (all when `None`), ascending by date,
    /// one per day
    fn query(&self, since: Option<NaiveDate>) -> Result<Vec<WeightLogEntry>>;

    /// Insert or update the entry for `entry.date`
    fn upsert(&self, entry: WeightLogEntry) -> Result<()>;
}

/// Holder of the single active goal
pub trait GoalStore: Send + Sync {
    fn active(&self) -> Result<Option<Goal>>;
    fn replace(&self, goal: Goal) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

/// Append-only history of correction segments
pub trait SegmentStore: Send + Sync {
    /// Segments for a goal in chronological order
    fn list_for_goal(&self, goal_id: Uuid) -> Result<Vec<CorrectionSegment>>;

    /// Append a segment; fails if it would overlap the goal's last segment.
    /// Appending the last segment's window again returns the recorded id.
    fn append(&self, segment: CorrectionSegment) -> Result<Uuid>;

    /// Bulk reset: drop every segment of a goal, returning how many were removed
    fn clear_for_goal(&self, goal_id: Uuid) -> Result<usize>;
}

/// Reject a segment that starts before its predecessor ends
pub(crate) fn check_order(
    previous: Option<&CorrectionSegment>,
    next: &CorrectionSegment,
) -> Result<()> {
    if next.end_date < next.start_date {
        return Err(Error::Store(format!(
            "segment ends ({}) before it starts ({})",
            next.end_date, next.start_date
        )));
    }
    if let Some(previous) = previous {
        if previous.end_date > next.start_date {
            return Err(Error::Store(format!(
                "segment starting {} overlaps previous segment ending {}",
                next.start_date, previous.end_date
            )));
        }
    }
    Ok(())
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| Error::Store("in-memory store lock poisoned".into()))
}

/// In-memory weight log
#[derive(Debug, Default)]
pub struct MemoryLogStore {
    entries: Mutex<Vec<WeightLogEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-filled with entries
    pub fn with_entries(entries: Vec<WeightLogEntry>) -> Self {
        Self {
            entries: Mutex::new(crate::history::fold_by_day(entries)),
        }
    }
}

impl WeightLogStore for MemoryLogStore {
    fn query(&self, since: Option<NaiveDate>) -> Result<Vec<WeightLogEntry>> {
        let entries = lock(&self.entries)?;
        Ok(entries
            .iter()
            .filter(|e| since.map_or(true, |since| e.date >= since))
            .cloned()
            .collect())
    }

    fn upsert(&self, entry: WeightLogEntry) -> Result<()> {
        let mut entries = lock(&self.entries)?;
        let all = std::mem::take(&mut *entries);
        *entries = crate::history::fold_by_day(all.into_iter().chain(std::iter::once(entry)));
        Ok(())
    }
}

/// In-memory active goal
#[derive(Debug, Default)]
pub struct MemoryGoalStore {
    goal: Mutex<Option<Goal>>,
}

impl MemoryGoalStore {
    pub fn new(goal: Option<Goal>) -> Self {
        Self {
            goal: Mutex::new(goal),
        }
    }
}

impl GoalStore for MemoryGoalStore {
    fn active(&self) -> Result<Option<Goal>> {
        Ok(lock(&self.goal)?.clone())
    }

    fn replace(&self, goal: Goal) -> Result<()> {
        *lock(&self.goal)? = Some(goal);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *lock(&self.goal)? = None;
        Ok(())
    }
}

/// In-memory segment history
#[derive(Debug, Default)]
pub struct MemorySegmentStore {
    segments: Mutex<Vec<CorrectionSegment>>,
}

impl MemorySegmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SegmentStore for MemorySegmentStore {
    fn list_for_goal(&self, goal_id: Uuid) -> Result<Vec<CorrectionSegment>> {
        Ok(lock(&self.segments)?
            .iter()
            .filter(|s| s.goal_id == goal_id)
            .cloned()
            .collect())
    }

    fn append(&self, segment: CorrectionSegment) -> Result<Uuid> {
        let mut segments = lock(&self.segments)?;
        let previous = segments.iter().rev().find(|s| s.goal_id == segment.goal_id);
        if let Some(last) = previous.filter(|last| last.same_window(&segment)) {
            return Ok(last.id);
        }
        check_order(previous, &segment)?;
        let id = segment.id;
        segments.push(segment);
        Ok(id)
    }

    fn clear_for_goal(&self, goal_id: Uuid) -> Result<usize> {
        let mut segments = lock(&self.segments)?;
        let before = segments.len();
        segments.retain(|s| s.goal_id != goal_id);
        Ok(before - segments.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SegmentProvenance;
    use chrono::{Duration, Utc};

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap() + Duration::days(offset)
    }

    fn segment(goal_id: Uuid, start: i64, end: i64) -> CorrectionSegment {
        CorrectionSegment {
            id: Uuid::new_v4(),
            goal_id,
            start_date: day(start),
            end_date: day(end),
            start_weight_kg: 80.0,
            end_weight_kg: 79.0,
            rate_per_week: -0.7,
            target_calories: 2000,
            provenance: SegmentProvenance::Engine,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_memory_log_upsert_by_day() {
        let store = MemoryLogStore::new();
        store.upsert(WeightLogEntry::new(day(1)).with_weight(80.0)).unwrap();
        store.upsert(WeightLogEntry::new(day(0)).with_weight(81.0)).unwrap();
        store.upsert(WeightLogEntry::new(day(1)).with_calories(2000)).unwrap();

        let all = store.query(None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].weight_and_calories(), Some((80.0, 2000)));

        let since = store.query(Some(day(1))).unwrap();
        assert_eq!(since.len(), 1);
    }

    #[test]
    fn test_segment_order_enforced() {
        let store = MemorySegmentStore::new();
        let goal_id = Uuid::new_v4();

        store.append(segment(goal_id, 0, 10)).unwrap();
        store.append(segment(goal_id, 10, 20)).unwrap();
        let err = store.append(segment(goal_id, 15, 25)).unwrap_err();
        assert!(matches!(err, Error::Store(_)));

        let recorded = store.list_for_goal(goal_id).unwrap()[1].clone();
        let replay = CorrectionSegment {
            id: Uuid::new_v4(),
            ..recorded.clone()
        };
        assert_eq!(store.append(replay).unwrap(), recorded.id);

        // Other goals are independent
        store.append(segment(Uuid::new_v4(), 0, 5)).unwrap();
        assert_eq!(store.list_for_goal(goal_id).unwrap().len(), 2);
    }

    #[test]
    fn test_clear_for_goal() {
        let store = MemorySegmentStore::new();
        let goal_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.append(segment(goal_id, 0, 10)).unwrap();
        store.append(segment(other, 0, 10)).unwrap();

        assert_eq!(store.clear_for_goal(goal_id).unwrap(), 1);
        assert!(store.list_for_goal(goal_id).unwrap().is_empty());
        assert_eq!(store.list_for_goal(other).unwrap().len(), 1);
    }
}
