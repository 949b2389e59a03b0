//! Active goal persistence with file locking.
//!
//! The active goal lives in a small JSON state file that is replaced
//! wholesale on every change.

use crate::store::GoalStore;
use crate::{Error, Goal, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// On-disk shape of the goal state file
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GoalState {
    pub active: Option<Goal>,
}

impl GoalState {
    /// Load state from a file with shared locking
    ///
    /// Returns default state if file doesn't exist.
    /// If file is corrupted, logs a warning and returns default state.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!("No goal state file found, no active goal");
            return Ok(Self::default());
        }

        let file = File::open(path)?;
        file.lock_shared()?;

        let mut contents = String::new();
        let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
        file.unlock()?;
        read?;

        match serde_json::from_str::<GoalState>(&contents) {
            Ok(state) => {
                tracing::debug!("Loaded goal state from {:?}", path);
                Ok(state)
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse goal state {:?}: {}. Treating as no active goal.",
                    path,
                    e
                );
                Ok(Self::default())
            }
        }
    }

    /// Save state to a file with exclusive locking
    ///
    /// Atomically writes state by:
    /// 1. Writing to a temp file
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| Error::Store(format!("{:?} has no parent directory", path)))?;
        std::fs::create_dir_all(parent)?;

        // Create unique temp file in the same directory for atomic rename
        let temp = NamedTempFile::new_in(parent)?;

        // Acquire exclusive lock on the temp file to serialize concurrent writers
        temp.as_file().lock_exclusive()?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string_pretty(self)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.as_file().unlock()?;

        // Atomically replace old state file
        temp.persist(path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved goal state to {:?}", path);
        Ok(())
    }
}

/// Goal store backed by a JSON state file
#[derive(Clone, Debug)]
pub struct JsonGoalStore {
    path: PathBuf,
}

impl JsonGoalStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl GoalStore for JsonGoalStore {
    fn active(&self) -> Result<Option<Goal>> {
        Ok(GoalState::load(&self.path)?.active)
    }

    fn replace(&self, goal: Goal) -> Result<()> {
        tracing::info!("Replacing active goal with {}", goal.id);
        GoalState { active: Some(goal) }.save(&self.path)
    }

    fn clear(&self) -> Result<()> {
        tracing::info!("Clearing active goal");
        GoalState::default().save(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GoalArchetype, RateSpec, TimeMode};

    fn sample_goal() -> Goal {
        let mut goal = Goal::new(
            GoalArchetype::Cut,
            TimeMode::ByRate,
            RateSpec::Flat { kg_per_week: 0.5 },
        );
        goal.target_weight_kg = Some(72.5);
        goal.baseline_maintenance = Some(2450);
        goal
    }

    #[test]
    fn test_replace_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonGoalStore::new(temp_dir.path().join("goal.json"));
        let goal = sample_goal();

        store.replace(goal.clone()).unwrap();

        assert_eq!(store.active().unwrap(), Some(goal));
    }

    #[test]
    fn test_missing_file_has_no_goal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonGoalStore::new(temp_dir.path().join("nonexistent.json"));

        assert!(store.active().unwrap().is_none());
    }

    #[test]
    fn test_clear() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonGoalStore::new(temp_dir.path().join("goal.json"));
        store.replace(sample_goal()).unwrap();

        store.clear().unwrap();

        assert!(store.active().unwrap().is_none());
    }

    #[test]
    fn test_corrupted_state_has_no_goal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("goal.json");
        std::fs::write(&path, "{ invalid json }").unwrap();

        let store = JsonGoalStore::new(&path);
        assert!(store.active().unwrap().is_none());
    }

    #[test]
    fn test_atomic_save_leaves_no_temp_files() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = JsonGoalStore::new(temp_dir.path().join("goal.json"));
        store.replace(sample_goal()).unwrap();

        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "goal.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only goal.json, found extras: {:?}",
            extras
        );
    }
}
