//! CLI options interaction tests
//!
//! These run the binary up to the point where it would touch the network
//! namespaces, so every case here ends in `--help`, `--env-help` or a
//! configuration error.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

/// Command running in an empty directory so no stray `.env` is picked up
fn create_test_cmd(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("hsbench").unwrap();
    cmd.current_dir(dir.path());
    for var in ["ROUNDS", "SAMPLE_SIZE", "MAX_HS_DUR", "MAX_ATTEMPTS", "USE_SUDO", "LOG_FORMAT"] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_help_lists_options() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--sigs"))
        .stdout(predicate::str::contains("--rounds"))
        .stdout(predicate::str::contains("--rec"))
        .stdout(predicate::str::contains("--max-attempts"));
}

#[test]
fn test_env_help() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .arg("--env-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MAX_HS_DUR"))
        .stdout(predicate::str::contains("Configuration Priority"));
}

#[test]
fn test_missing_sigs_is_usage_error() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--out", "."])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--sigs"));
}

#[test]
fn test_nonexistent_sigs_file() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--sigs", "missing.txt", "--out", ".", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("missing.txt"));
}

#[test]
fn test_nonexistent_out_dir() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("sigs.txt"), "dilithium2\n").unwrap();

    create_test_cmd(&dir)
        .args(["--sigs", "sigs.txt", "--out", "no-such-dir", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("no-such-dir"));
}

#[test]
fn test_legacy_single_dash_options_are_accepted() {
    let dir = TempDir::new().unwrap();

    // A zero round count only fails validation if `-rounds` was understood
    create_test_cmd(&dir)
        .args(["-rounds", "0", "-sigs", "sigs.txt", "-out", ".", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--rounds must be greater than 0"));
}

#[test]
fn test_invalid_overwrite_policy() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--sigs", "s", "--out", ".", "--overwrite", "sometimes"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("overwrite"));
}

#[test]
fn test_conflicting_color_flags() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .args(["--sigs", "s", "--out", ".", "--color", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("--color and --no-color"));
}

#[test]
fn test_invalid_env_value() {
    let dir = TempDir::new().unwrap();
    create_test_cmd(&dir)
        .env("SAMPLE_SIZE", "many")
        .args(["--sigs", "s", "--out", ".", "--no-color"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("SAMPLE_SIZE"));
}

#[test]
fn test_env_file_in_working_directory() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "MAX_HS_DUR=0\n").unwrap();

    create_test_cmd(&dir)
        .args(["--sigs", "s", "--out", ".", "--no-color"])
        .assert()
        .failure()
        .code(1);
}
