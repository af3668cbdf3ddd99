//! CLI tests for the `tt` binary
//!
//! stdout is a pipe under the test harness, so these runs use the plain
//! monitor.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PLAN: &str = r#"
title: Smoke
subtitle: cli
tasks:
  - name: Fetch
    units: 2
    delay-ms: 1
    children:
      - name: Pages
        units: 2
        delay-ms: 1
  - name: Report
"#;

/// `tt` isolated from the user's config and log directories
fn tt(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tt").expect("tt binary should be built");
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env_remove("RUST_LOG");
    cmd
}

fn write_plan(dir: &TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("plan.yml");
    fs::write(&path, content).expect("Failed to write plan");
    path
}

#[test]
fn test_check_reports_counts() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, PLAN);

    tt(dir.path())
        .arg("check")
        .arg(&plan)
        .assert()
        .success()
        .stdout(predicate::str::contains("Smoke").and(predicate::str::contains("3 tasks, depth 2")));
}

#[test]
fn test_check_rejects_bad_plan() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, "title: Broken\ntasks:\n  - name: a\n    weight: -1\n");

    tt(dir.path())
        .arg("check")
        .arg(&plan)
        .assert()
        .failure()
        .stderr(predicate::str::contains("weights must be positive"));
}

#[test]
fn test_check_missing_plan() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    tt(dir.path())
        .args(["check", "does-not-exist.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does-not-exist.yml"));
}

#[test]
fn test_run_prints_finished_tasks() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, PLAN);

    tt(dir.path())
        .arg("run")
        .arg(&plan)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Task 'Fetch' > 'Pages' done")
                .and(predicate::str::contains("Task 'Fetch' done"))
                .and(predicate::str::contains("Task 'Report' done"))
                .and(predicate::str::contains("Finished 3 tasks")),
        );
}

#[test]
fn test_run_with_caps_override() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, PLAN);

    tt(dir.path())
        .arg("run")
        .arg(&plan)
        .args(["--caps", "0,2,2", "--plain"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished 3 tasks"));
}

#[test]
fn test_demo_with_seed() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    tt(dir.path())
        .args([
            "demo",
            "--branches",
            "2",
            "--leaves",
            "2",
            "--max-units",
            "2",
            "--max-delay-ms",
            "1",
            "--seed",
            "9",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Task 'Batch 1' done").and(predicate::str::contains("Finished")));
}

#[test]
fn test_config_file_is_used() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, PLAN);
    let config = dir.path().join("tt.yml");
    fs::write(&config, "monitor:\n  mode: plain\nscheduler:\n  level-caps: [0, 1, 1]\n").expect("config");

    tt(dir.path())
        .arg("run")
        .arg(&plan)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Finished 3 tasks"));
}

#[test]
fn test_bad_config_path_fails() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let plan = write_plan(&dir, PLAN);

    tt(dir.path())
        .arg("check")
        .arg(&plan)
        .args(["--config", "missing.yml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}

#[test]
fn test_help_mentions_log_path() {
    let dir = TempDir::new().expect("Failed to create temp dir");

    tt(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Logs are written to:"));
}
