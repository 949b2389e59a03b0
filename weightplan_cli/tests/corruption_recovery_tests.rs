//! Corruption recovery tests for wplan.
//!
//! These tests verify the system can handle:
//! - Corrupted goal state files
//! - Corrupted log and segment lines
//! - Missing files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("wplan"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_corrupted_goal_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(data_dir.join("goal.json"), "{ invalid json }}}}").unwrap();

    cli()
        .args(["goal", "show"])
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No active goal"));

    // A fresh goal replaces the corrupted file
    cli()
        .args(["goal", "set", "--archetype", "bulk", "--mode", "by-duration"])
        .args(["--duration", "12", "--preset", "gentle"])
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success();

    let content = fs::read_to_string(data_dir.join("goal.json")).unwrap();
    assert!(content.contains("bulk"));
}

#[test]
fn test_corrupted_log_lines_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    fs::write(
        data_dir.join("log.jsonl"),
        "{ invalid json }\n{\"date\":\"2024-03-01\"\n",
    )
    .unwrap();

    for (day, weight) in [("01", "80.0"), ("08", "80.0")] {
        cli()
            .args(["log", "--weight", weight, "--calories", "2400"])
            .args(["--date", &format!("2024-03-{}", day)])
            .arg("--data-dir")
            .arg(data_dir)
            .assert()
            .success();
    }

    cli()
        .args(["maintenance", "--today", "2024-03-08"])
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("2400 kcal/day"));
}

#[test]
fn test_partial_segment_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli()
        .args(["goal", "set", "--archetype", "maintain", "--mode", "by-rate"])
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success();

    // Simulate a crash mid-append
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(data_dir.join("segments.jsonl"))
        .unwrap();
    file.write_all(b"{\"id\":\"00000000-").unwrap();
    drop(file);

    cli()
        .arg("segments")
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("No corrections yet"));
}

#[test]
fn test_missing_data_dir_is_created() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("nested").join("data");

    cli()
        .args(["log", "--calories", "1900"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    assert!(data_dir.join("log.jsonl").exists());
}

#[test]
fn test_import_missing_csv_fails() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    cli()
        .arg("import")
        .arg(data_dir.join("missing.csv"))
        .arg("--data-dir")
        .arg(data_dir)
        .assert()
        .failure();
}
