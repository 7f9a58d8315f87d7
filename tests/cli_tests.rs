//! Integration tests for the parallel-runner CLI

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn runner_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("parallel-runner").unwrap();
    // Keep user/repository config and environment out of the picture.
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("RUST_LOG")
        .env_remove("PARALLEL_RUNNER_MAX_PARALLEL")
        .env_remove("PARALLEL_RUNNER_CAPACITY")
        .env_remove("PARALLEL_RUNNER_FAIL_FAST");
    cmd
}

/// Test CLI binary exists and responds to --help
#[test]
fn test_cli_help() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("bounded worker pool"))
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_cli_short_help() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("parallel task runner"));
}

#[test]
fn test_cli_version() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("parallel-runner"));
}

/// Test invalid subcommand shows error
#[test]
fn test_invalid_subcommand() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_run_successful_workload() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .args(["run", "--tasks", "70", "--parallel", "4", "--task-ms", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2415"))
        .stdout(predicate::str::contains("All tasks completed"));
}

#[test]
fn test_run_with_failures_exits_nonzero() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .args(["run", "--tasks", "10", "--fail-above", "7", "--task-ms", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("2 task(s) failed"));
}

#[test]
fn test_run_fail_fast_stops_early() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .args([
            "run",
            "--tasks",
            "50",
            "--parallel",
            "1",
            "--capacity",
            "1",
            "--fail-fast",
            "--fail-above",
            "4",
            "--task-ms",
            "1",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 task(s) failed"))
        .stdout(predicate::str::contains("rejected after cancellation"));
}

#[test]
fn test_run_with_scaling() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .args(["run", "--tasks", "40", "--parallel", "1", "--scale-to", "4", "--task-ms", "2"])
        .assert()
        .success()
        .stdout(predicate::str::contains("780"));
}

#[test]
fn test_config_shows_defaults() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[runner]"))
        .stdout(predicate::str::contains("capacity = 64"));
}

#[test]
fn test_config_reads_repository_file_and_env() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("parallel-runner.toml"),
        "[runner]\ncapacity = 7\nmax_parallel = 2\n",
    )
    .unwrap();

    runner_cmd(&dir)
        .env("PARALLEL_RUNNER_MAX_PARALLEL", "5")
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"capacity\": 7"))
        .stdout(predicate::str::contains("\"max_parallel\": 5"));
}

#[test]
fn test_missing_custom_config_fails() {
    let dir = TempDir::new().unwrap();
    runner_cmd(&dir)
        .args(["--config", "missing.yaml", "config"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config file not found"));
}
