//! Append-only JSONL (JSON Lines) stores with file locking.
//!
//! Both the weight log and the correction segment history are kept as
//! JSONL files. Writers take an exclusive `fs2` lock; readers a shared one.
//! The log is never rewritten on upsert: later lines for the same day win
//! when the file is folded on read.

use crate::store::{check_order, SegmentStore, WeightLogStore};
use crate::{CorrectionSegment, Error, Result, WeightLogEntry};
use chrono::NaiveDate;
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Append one record as a JSON line under an exclusive lock
pub fn append_line<T: Serialize>(path: &Path, record: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let result = write_line(&file, record);

    // Lock is also released when file is dropped
    file.unlock()?;
    result
}

fn write_line<T: Serialize>(file: &File, record: &T) -> Result<()> {
    let mut writer = std::io::BufWriter::new(file);
    let line = serde_json::to_string(record)?;
    writer.write_all(line.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Read every parseable record from a JSONL file.
///
/// Missing files read as empty. Malformed lines are logged and skipped.
pub fn read_lines<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;
    let records = parse_lines(&file, path);
    file.unlock()?;

    tracing::debug!("Read {} records from {:?}", records.len(), path);
    Ok(records)
}

/// Parse records from a file the caller has already locked
fn parse_lines<T: DeserializeOwned>(file: &File, path: &Path) -> Vec<T> {
    let reader = BufReader::new(file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!("Failed to read {:?} line {}: {}", path, line_num + 1, e);
                continue;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<T>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse {:?} line {}: {}", path, line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    records
}

/// Weight log kept as a JSONL file of per-day writes
#[derive(Clone, Debug)]
pub struct JsonlLogStore {
    path: PathBuf,
}

impl JsonlLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WeightLogStore for JsonlLogStore {
    fn query(&self, since: Option<NaiveDate>) -> Result<Vec<WeightLogEntry>> {
        let writes: Vec<WeightLogEntry> = read_lines(&self.path)?;
        let mut entries = crate::history::fold_by_day(writes);
        if let Some(since) = since {
            entries.retain(|e| e.date >= since);
        }
        Ok(entries)
    }

    fn upsert(&self, entry: WeightLogEntry) -> Result<()> {
        append_line(&self.path, &entry)?;
        tracing::debug!("Logged entry for {}", entry.date);
        Ok(())
    }
}

/// Correction segment history kept as a JSONL file
#[derive(Clone, Debug)]
pub struct JsonlSegmentStore {
    path: PathBuf,
}

impl JsonlSegmentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Open the segment file under an exclusive lock.
    ///
    /// Every mutation holds this lock across its read and its write, and
    /// writes in place, so a waiting writer never lands in a replaced file.
    fn lock_for_update(&self) -> Result<File> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)?;
        file.lock_exclusive()?;
        Ok(file)
    }
}

impl SegmentStore for JsonlSegmentStore {
    fn list_for_goal(&self, goal_id: Uuid) -> Result<Vec<CorrectionSegment>> {
        let mut segments: Vec<CorrectionSegment> = read_lines(&self.path)?;
        segments.retain(|s| s.goal_id == goal_id);
        Ok(segments)
    }

    /// Check and append under one exclusive lock so concurrent processes
    /// cannot both record a segment after the same predecessor.
    /// Re-appending the last recorded window returns the recorded id.
    fn append(&self, segment: CorrectionSegment) -> Result<Uuid> {
        let file = self.lock_for_update()?;

        let result = (|| -> Result<Uuid> {
            let mut existing: Vec<CorrectionSegment> = parse_lines(&file, &self.path);
            existing.retain(|s| s.goal_id == segment.goal_id);

            if let Some(last) = existing.last().filter(|last| last.same_window(&segment)) {
                tracing::info!(
                    "Segment {} to {} already recorded for goal {}",
                    segment.start_date,
                    segment.end_date,
                    segment.goal_id
                );
                return Ok(last.id);
            }

            check_order(existing.last(), &segment)?;
            write_line(&file, &segment)?;
            tracing::info!(
                "Appended correction segment {} ({} to {}) for goal {}",
                segment.id,
                segment.start_date,
                segment.end_date,
                segment.goal_id
            );
            Ok(segment.id)
        })();

        file.unlock()?;
        result
    }

    fn clear_for_goal(&self, goal_id: Uuid) -> Result<usize> {
        let file = self.lock_for_update()?;

        let result = (|| -> Result<usize> {
            let all: Vec<CorrectionSegment> = parse_lines(&file, &self.path);
            let before = all.len();
            let kept: Vec<_> = all.into_iter().filter(|s| s.goal_id != goal_id).collect();
            let removed = before - kept.len();
            if removed == 0 {
                return Ok(0);
            }

            file.set_len(0)?;
            {
                let mut writer = std::io::BufWriter::new(&file);
                for segment in &kept {
                    serde_json::to_writer(&mut writer, segment)?;
                    writer.write_all(b"\n")?;
                }
                writer.flush()?;
            }
            file.sync_all()?;

            tracing::info!("Cleared {} segments for goal {}", removed, goal_id);
            Ok(removed)
        })();

        file.unlock()?;
        result
    }
}
