//! Concurrency tests for wplan.
//!
//! These tests verify that multiple processes can safely:
//! - Append to the log simultaneously (file locking)
//! - Run correction evaluations without duplicating segments

use assert_cmd::Command;
use std::fs;
use std::thread;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("wplan"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_concurrent_logging() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (1..=8)
        .map(|day| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                cli()
                    .args(["log", "--weight", "75.0", "--calories", "2200"])
                    .args(["--date", &format!("2024-02-{:02}", day)])
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let content = fs::read_to_string(data_dir.join("log.jsonl")).expect("Failed to read log");
    assert_eq!(content.lines().count(), 8, "Expected 8 log lines");
    for line in content.lines() {
        serde_json::from_str::<serde_json::Value>(line).expect("Interleaved write in log");
    }
}

#[test]
fn test_concurrent_corrections_append_once() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    // Two on-plan weeks then a sharp drop
    let mut csv = String::from("date,weight_kg,calories\n");
    for d in 0..19 {
        let weight = if d < 14 {
            70.0 - 0.5 * d as f64 / 7.0
        } else {
            70.0 - 0.5 * 13.0 / 7.0 - 0.4 * (d - 13) as f64
        };
        csv.push_str(&format!("2024-01-{:02},{:.4},2000\n", d + 1, weight));
    }
    let csv_path = data_dir.join("history.csv");
    fs::write(&csv_path, csv).unwrap();

    cli()
        .args(["goal", "set", "--archetype", "cut", "--mode", "by-rate"])
        .args(["--rate-kg", "0.5", "--target-weight", "65"])
        .args(["--today", "2024-01-01"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    // Import without reacting on a date where maintenance is available
    cli()
        .arg("import")
        .arg(&csv_path)
        .args(["--today", "2024-03-01"])
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let data_dir = data_dir.clone();
            thread::spawn(move || {
                cli()
                    .arg("correct")
                    .args(["--today", "2024-01-19"])
                    .arg("--data-dir")
                    .arg(&data_dir)
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    let content = fs::read_to_string(data_dir.join("segments.jsonl")).unwrap();
    assert_eq!(content.lines().count(), 1, "Correction recorded more than once");
}
