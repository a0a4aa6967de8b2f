//! Focused CLI argument parsing tests.
//!
//! These never start a test run.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn version_command_succeeds() {
    Command::cargo_bin("nekara")
        .unwrap()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nekara-cli"));
}

#[test]
fn version_flag_shows_version() {
    Command::cargo_bin("nekara")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("nekara"));
}

#[test]
fn help_flag_shows_usage() {
    Command::cargo_bin("nekara")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("list"));
}

#[test]
fn run_requires_a_program() {
    Command::cargo_bin("nekara")
        .unwrap()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn run_help_shows_options() {
    Command::cargo_bin("nekara")
        .unwrap()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--seed"))
        .stdout(predicate::str::contains("--iterations"))
        .stdout(predicate::str::contains("--fail-fast"))
        .stdout(predicate::str::contains("--max-decisions"));
}

#[test]
fn seed_must_be_a_number() {
    Command::cargo_bin("nekara")
        .unwrap()
        .args(["run", "racy-counter", "--seed", "forty-two"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn ephemeral_conflicts_with_trace_dir() {
    Command::cargo_bin("nekara")
        .unwrap()
        .args(["run", "nondet", "--ephemeral", "--trace-dir", "traces"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("nekara")
        .unwrap()
        .arg("frobnicate")
        .assert()
        .failure();
}
