//! Concurrency tests for the circuit binary.
//!
//! These tests verify that multiple processes can safely:
//! - Log sessions one after another without losing records
//! - Read the store while another process writes it
//! - Never leave a half-written store file behind

use assert_cmd::Command;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("circuit").expect("Failed to find circuit binary");
    cmd.env("XDG_CONFIG_HOME", data_dir.join("config"))
        .arg("--data-dir")
        .arg(data_dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

fn read_history(data_dir: &Path) -> Vec<serde_json::Value> {
    let contents = std::fs::read_to_string(data_dir.join("store/workouts.json"))
        .expect("Failed to read history");
    serde_json::from_str(&contents).expect("History is valid JSON")
}

#[test]
fn test_sequential_sessions_all_logged() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path();

    // Run sessions with slight delays (more realistic than thundering herd)
    for i in 0..5 {
        thread::sleep(Duration::from_millis(i * 5));
        cli(data_dir)
            .args(["--seed", &i.to_string(), "start", "--auto"])
            .assert()
            .success();
    }

    let history = read_history(data_dir);
    assert_eq!(history.len(), 5, "Expected 5 sessions, got {}", history.len());
}

#[test]
fn test_concurrent_reads_and_writes() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    // Create initial session
    cli(&data_dir)
        .args(["--seed", "1", "start", "--auto"])
        .assert()
        .success();

    let writer_dir = data_dir.clone();
    let writer = thread::spawn(move || {
        for i in 0..3 {
            cli(&writer_dir)
                .args(["--seed", &(10 + i).to_string(), "start", "--auto", "--rate", "7"])
                .assert()
                .success();
        }
    });

    let reader_dir = data_dir.clone();
    let reader = thread::spawn(move || {
        for _ in 0..5 {
            cli(&reader_dir).arg("stats").assert().success();
            cli(&reader_dir).args(["--seed", "3", "plan"]).assert().success();
            thread::sleep(Duration::from_millis(10));
        }
    });

    writer.join().expect("Writer thread panicked");
    reader.join().expect("Reader thread panicked");

    assert_eq!(read_history(&data_dir).len(), 4);
}

#[test]
fn test_parallel_sessions_leave_valid_store() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..3)
        .map(|i| {
            let dir = data_dir.clone();
            thread::spawn(move || {
                cli(&dir)
                    .args(["--seed", &i.to_string(), "start", "--auto"])
                    .assert()
                    .success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("Session thread panicked");
    }

    // Whole-list replacement is last-writer-wins: records may be lost but
    // the file is always complete JSON. Per-key .lock files stay behind.
    let history = read_history(&data_dir);
    assert!(!history.is_empty() && history.len() <= 3);

    let leftovers: Vec<_> = std::fs::read_dir(data_dir.join("store"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(true, |ext| ext != "json" && ext != "lock")
        })
        .collect();
    assert!(leftovers.is_empty(), "Temp files left behind: {:?}", leftovers);
}
