//! CLI end-to-end tests
//!
//! Tests for the reelhouse command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the reelhouse binary
#[allow(deprecated)]
fn reelhouse_cmd() -> Command {
    Command::cargo_bin("reelhouse").unwrap()
}

/// Write a config whose catalog lives in `dir`.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let config_path = dir.join("config.toml");
    fs::write(
        &config_path,
        format!(
            "[database]\npath = \"{}\"\n",
            dir.join("catalog.sqlite").display()
        ),
    )
    .unwrap();
    config_path
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = reelhouse_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = reelhouse_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelhouse"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_flag() {
    let mut cmd = reelhouse_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("reelhouse"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = reelhouse_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_check_tools_command() {
    let mut cmd = reelhouse_cmd();
    cmd.arg("check-tools").assert().success().stdout(
        predicate::str::contains("ffprobe").and(predicate::str::contains("mediainfo")),
    );
}

#[test]
fn test_cli_start_help() {
    let mut cmd = reelhouse_cmd();
    cmd.args(["start", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Start the streaming server"));
}

#[test]
fn test_cli_validate_valid_config() {
    let dir = tempdir().unwrap();
    let config_path = write_config(dir.path());

    let mut cmd = reelhouse_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("ffmpeg-mpegts"));
}

#[test]
fn test_cli_validate_invalid_config() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("bad.toml");
    fs::write(&config_path, "[server]\nport = 0\n").unwrap();

    let mut cmd = reelhouse_cmd();
    cmd.arg("validate").arg(&config_path).assert().failure();
}

#[test]
fn test_cli_validate_transcoder_without_input() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("bad.toml");
    fs::write(
        &config_path,
        "[[transcoders]]\nname = \"broken\"\ncommand = \"ffmpeg -f mpegts pipe:1\"\n",
    )
    .unwrap();

    let mut cmd = reelhouse_cmd();
    cmd.arg("validate")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("%i"));
}

#[test]
fn test_cli_inspect_missing_file() {
    let mut cmd = reelhouse_cmd();
    cmd.args(["inspect", "/nonexistent/file.mkv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_add_root_scan_and_unlock() {
    let dir = tempdir().unwrap();
    let config_path = write_config(dir.path());
    let library = dir.path().join("library");
    fs::create_dir_all(library.join("season")).unwrap();
    fs::write(library.join("season/e01.mkv"), b"not really video").unwrap();
    fs::write(library.join("readme.txt"), b"ignored").unwrap();

    reelhouse_cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("add-root")
        .arg(&library)
        .assert()
        .success()
        .stdout(predicate::str::contains("Root folder 1 registered"));

    reelhouse_cmd()
        .arg("--config")
        .arg(&config_path)
        .args(["scan", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scan complete"))
        .stdout(predicate::str::contains("Folders: 1 created"))
        .stdout(predicate::str::contains("Media: 1 created"));

    // Second pass finds nothing new
    reelhouse_cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("scan-all")
        .assert()
        .success()
        .stdout(predicate::str::contains("Media: 0 created, 0 updated, 0 deleted, 1 unchanged"));

    reelhouse_cmd()
        .arg("--config")
        .arg(&config_path)
        .args(["unlock", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Folder 1 unlocked"));

    reelhouse_cmd()
        .arg("--config")
        .arg(&config_path)
        .args(["unlock", "42"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Folder not found"));
}

#[test]
fn test_cli_add_root_missing_directory() {
    let dir = tempdir().unwrap();
    let config_path = write_config(dir.path());

    reelhouse_cmd()
        .arg("--config")
        .arg(&config_path)
        .args(["add-root", "/nonexistent/library"])
        .assert()
        .failure();
}

#[test]
fn test_cli_scan_all_without_roots() {
    let dir = tempdir().unwrap();
    let config_path = write_config(dir.path());

    reelhouse_cmd()
        .arg("--config")
        .arg(&config_path)
        .arg("scan-all")
        .assert()
        .success()
        .stdout(predicate::str::contains("No roots to scan"));
}
