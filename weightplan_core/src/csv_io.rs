//! CSV import and export of the weight/calorie log.
//!
//! Rows are `date,weight_kg,calories` with optional values left empty.
//! Imported values are tagged as synced from the CSV file.

use crate::store::WeightLogStore;
use crate::{EntrySource, Error, Result, WeightLogEntry};
use chrono::NaiveDate;
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

const CSV_SOURCE: &str = "csv";

/// A row in the log CSV
#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    date: String,
    weight_kg: Option<f64>,
    calories: Option<i32>,
}

impl From<&WeightLogEntry> for CsvRow {
    fn from(entry: &WeightLogEntry) -> Self {
        CsvRow {
            date: entry.date.format("%Y-%m-%d").to_string(),
            weight_kg: entry.weight_kg,
            calories: entry.calories,
        }
    }
}

impl TryFrom<CsvRow> for WeightLogEntry {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d")
            .map_err(|e| Error::Import(format!("Invalid date {:?}: {}", row.date, e)))?;

        let synced = || EntrySource::Synced {
            source: CSV_SOURCE.into(),
        };
        let entry = WeightLogEntry {
            date,
            weight_kg: row.weight_kg,
            weight_source: row.weight_kg.map(|_| synced()),
            calories: row.calories,
            calories_source: row.calories.map(|_| synced()),
        };
        entry.validate()?;
        Ok(entry)
    }
}

/// Import every valid row of a CSV file into the log.
///
/// Invalid rows are logged and skipped. Returns the number of rows imported.
pub fn import_csv(path: &Path, store: &dyn WeightLogStore) -> Result<usize> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut imported = 0;
    for (row_num, result) in reader.deserialize::<CsvRow>().enumerate() {
        let entry = match result.map_err(Error::from).and_then(WeightLogEntry::try_from) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Skipping CSV row {}: {}", row_num + 2, e);
                continue;
            }
        };
        store.upsert(entry)?;
        imported += 1;
    }

    tracing::info!("Imported {} log entries from {:?}", imported, path);
    Ok(imported)
}

/// Write entries to a fresh CSV file, fsynced before returning
pub fn export_csv(entries: &[WeightLogEntry], path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for entry in entries {
        writer.serialize(CsvRow::from(entry))?;
    }

    writer.flush()?;
    let file = writer
        .into_inner()
        .map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;

    tracing::info!("Exported {} log entries to {:?}", entries.len(), path);
    Ok(entries.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLogStore;

    #[test]
    fn test_import_skips_bad_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("log.csv");
        std::fs::write(
            &path,
            "date,weight_kg,calories\n\
             2024-01-01,80.5,2100\n\
             2024-01-02,,2300\n\
             2024-01-03,80.1,\n\
             not-a-date,80.0,2000\n\
             2024-01-04,-3,2000\n\
             2024-01-05,,\n",
        )
        .unwrap();
        let store = MemoryLogStore::new();

        let imported = import_csv(&path, &store).unwrap();

        assert_eq!(imported, 3);
        let entries = store.query(None).unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].weight_and_calories(), Some((80.5, 2100)));
        assert_eq!(entries[1].weight_kg, None);
        assert_eq!(
            entries[2].weight_source,
            Some(EntrySource::Synced {
                source: "csv".into()
            })
        );
        assert_eq!(entries[2].calories_source, None);
    }

    #[test]
    fn test_import_rejects_negative_calories() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("log.csv");
        std::fs::write(
            &path,
            "date,weight_kg,calories\n2024-01-06,80.0,-100\n2024-01-07,80.0,2100\n",
        )
        .unwrap();
        let store = MemoryLogStore::new();

        assert_eq!(import_csv(&path, &store).unwrap(), 1);
        assert_eq!(store.query(None).unwrap()[0].calories, Some(2100));
    }

    #[test]
    fn test_export_then_import() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("out").join("log.csv");
        let day = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let entries = vec![
            WeightLogEntry::new(day).with_weight(77.3).with_calories(1800),
            WeightLogEntry::new(day.succ_opt().unwrap()).with_calories(2000),
        ];

        assert_eq!(export_csv(&entries, &path).unwrap(), 2);

        let store = MemoryLogStore::new();
        assert_eq!(import_csv(&path, &store).unwrap(), 2);
        let back = store.query(None).unwrap();
        assert_eq!(back[0].weight_and_calories(), Some((77.3, 1800)));
        assert_eq!(back[1].calories, Some(2000));
    }

    #[test]
    fn test_import_missing_file_errors() {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = MemoryLogStore::new();

        let result = import_csv(&temp_dir.path().join("missing.csv"), &store);

        assert!(matches!(result, Err(Error::Csv(_))));
    }
}
