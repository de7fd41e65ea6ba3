//! Corruption recovery tests for the pouch binary.
//!
//! These tests verify the system can handle:
//! - Corrupted event log lines (bad JSON or bad UTF-8)
//! - Partial writes
//! - Malformed events (missing start, removal before insertion)
//! - Bad CSV rows and duplicate ids across files

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn cli(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pouch"));
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG");
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

const AT: &str = "2024-06-15T18:30:00Z";

#[test]
fn test_corrupted_lines_are_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("pouches");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("events.jsonl"),
        "{ invalid json }\n\
         {\"id\":\"00000000-0000-0000-0000-000000000001\",\"dose_mg\":6.0,\"inserted_at\":\"2024-06-15T18:15:00Z\"}\n\
         { more invalid }\n",
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("level")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--at")
        .arg(AT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nicotine level: 0.900 mg"))
        .stderr(predicate::str::contains("Failed to parse event"));
}

#[test]
fn test_invalid_utf8_line_is_skipped() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("pouches");
    fs::create_dir_all(&data_dir).unwrap();

    let mut contents = b"\xff\xfe garbage\n".to_vec();
    contents.extend_from_slice(
        b"{\"id\":\"00000000-0000-0000-0000-000000000001\",\"dose_mg\":6.0,\"inserted_at\":\"2024-06-15T18:15:00Z\"}\n",
    );
    fs::write(data_dir.join("events.jsonl"), contents).unwrap();

    cli(temp_dir.path())
        .arg("level")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--at")
        .arg(AT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nicotine level: 0.900 mg"))
        .stderr(predicate::str::contains("Failed to parse event at line 1"));
}

#[test]
fn test_partial_last_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("pouches");
    fs::create_dir_all(&data_dir).unwrap();

    // Simulates a writer that crashed mid-append
    fs::write(
        data_dir.join("events.jsonl"),
        "{\"id\":\"00000000-0000-0000-0000-000000000001\",\"dose_mg\":6.0,\"inserted_at\":\"2024-06-15T18:00:00Z\"}\n\
         {\"id\":\"00000000-0000-0000-0000-000000000002\",\"dose_mg\":",
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("level")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--at")
        .arg(AT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nicotine level: 1.800 mg"));
}

#[test]
fn test_malformed_events_contribute_nothing() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("pouches");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("events.jsonl"),
        // No insertion time
        "{\"id\":\"00000000-0000-0000-0000-000000000001\",\"dose_mg\":6.0}\n\
         {\"id\":\"00000000-0000-0000-0000-000000000002\",\"dose_mg\":6.0,\"inserted_at\":\"2024-06-15T18:20:00Z\",\"removed_at\":\"2024-06-15T18:00:00Z\"}\n\
         {\"id\":\"00000000-0000-0000-0000-000000000003\",\"dose_mg\":-4.0,\"inserted_at\":\"2024-06-15T18:00:00Z\"}\n\
         {\"id\":\"00000000-0000-0000-0000-000000000004\",\"dose_mg\":6.0,\"inserted_at\":\"2024-06-15T18:15:00Z\"}\n",
    )
    .unwrap();

    cli(temp_dir.path())
        .arg("level")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--at")
        .arg(AT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nicotine level: 0.900 mg"));
}

#[test]
fn test_csv_export_merged_with_log() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().join("pouches");
    fs::create_dir_all(&data_dir).unwrap();

    fs::write(
        data_dir.join("events.jsonl"),
        "{\"id\":\"00000000-0000-0000-0000-000000000001\",\"dose_mg\":6.0,\"inserted_at\":\"2024-06-15T18:15:00Z\"}\n",
    )
    .unwrap();

    // Row 1 duplicates the log entry with a different dose; the log wins
    fs::write(
        data_dir.join("events.csv"),
        "id,dose_mg,inserted_at,removed_at\n\
         00000000-0000-0000-0000-000000000001,12,2024-06-15T18:15:00Z,\n\
         garbage,row,here,\n\
         00000000-0000-0000-0000-000000000002,4,2024-06-15T16:00:00Z,2024-06-15T16:30:00Z\n",
    )
    .unwrap();

    // 0.9 + 1.2 * 0.5^(2h / 2h) = 1.5
    cli(temp_dir.path())
        .arg("level")
        .arg("--data-dir")
        .arg(&data_dir)
        .arg("--at")
        .arg(AT)
        .assert()
        .success()
        .stdout(predicate::str::contains("Nicotine level: 1.500 mg"));
}

#[test]
fn test_corrupted_config_is_reported() {
    let temp_dir = setup_test_dir();
    let config_dir = temp_dir.path().join("config/pouch");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(config_dir.join("config.toml"), "[absorption\nfull_release_minutes = ").unwrap();

    cli(temp_dir.path())
        .arg("level")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Toml"));
}
