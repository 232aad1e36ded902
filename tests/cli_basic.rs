//! Integration tests for basic CLI behavior.
//!
//! Tests that the binary exists, accepts standard flags, and each subcommand
//! responds to `--help` with appropriate text.

#![allow(deprecated)] // Command::cargo_bin

use assert_cmd::Command;
use predicates::prelude::*;

/// Helper: get a Command for the `streamsift` binary.
fn streamsift() -> Command {
    Command::cargo_bin("streamsift").expect("binary 'streamsift' should be built")
}

// ─── Top-level flags ─────────────────────────────────────────────────────────

#[test]
fn help_flag_shows_usage() {
    streamsift()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: streamsift"))
        .stdout(predicate::str::contains("serve"))
        .stdout(predicate::str::contains("streams"))
        .stdout(predicate::str::contains("resolve"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("fetch"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn version_flag_shows_semver() {
    streamsift()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"^streamsift \d+\.\d+\.\d+\n$").unwrap());
}

#[test]
fn no_args_shows_error_and_usage() {
    streamsift()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage: streamsift"));
}

#[test]
fn invalid_subcommand_fails() {
    streamsift()
        .arg("download")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

// ─── Subcommand help ─────────────────────────────────────────────────────────

#[test]
fn serve_help() {
    streamsift()
        .args(["serve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--bind"));
}

#[test]
fn resolve_help() {
    streamsift()
        .args(["resolve", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--host"))
        .stdout(predicate::str::contains("<URL>"));
}

#[test]
fn fetch_help_lists_sites() {
    streamsift()
        .args(["fetch", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--site"))
        .stdout(predicate::str::contains("anime"))
        .stdout(predicate::str::contains("comic"));
}

// ─── Subcommand argument validation ──────────────────────────────────────────

#[test]
fn streams_missing_url_fails() {
    streamsift()
        .arg("streams")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

#[test]
fn verify_missing_url_fails() {
    streamsift()
        .arg("verify")
        .assert()
        .failure()
        .stderr(predicate::str::contains("<URL>"));
}

#[test]
fn fetch_invalid_site_fails() {
    streamsift()
        .args(["fetch", "https://example.com", "--site", "manga"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn missing_explicit_config_fails() {
    streamsift()
        .args([
            "--config",
            "/nonexistent/streamsift/config.toml",
            "verify",
            "https://example.com/a.mp4",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}

#[test]
fn resolve_unknown_host_fails_without_network() {
    streamsift()
        .args(["resolve", "https://drive.example/file/1", "--host", "Gdrive"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No resolver"));
}
