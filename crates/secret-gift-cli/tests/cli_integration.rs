//! Integration tests for the sg CLI.
//!
//! Each test runs the real binary against a temporary exchange directory and
//! a temporary config file.
//!
//! Run with: `cargo test --package secret-gift-cli --test cli_integration`

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

/// Helper to run sg against an exchange directory.
fn run_sg(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sg"))
        .arg("--path")
        .arg(dir)
        .args(args)
        .env("SG_CONFIG_FILE", dir.join("config.json"))
        .env_remove("SG_MATCH_TOLERANCE")
        .env_remove("SG_STRATEGY")
        .env_remove("SG_EXHAUSTIVE_CEILING")
        .env_remove("SG_RETRY_BUDGET")
        .env_remove("SG_BACKUP_DIR")
        .output()
        .expect("Failed to execute sg command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

fn assert_ok(output: &Output) {
    assert!(
        output.status.success(),
        "command failed\nstdout: {}\nstderr: {}",
        stdout(output),
        stderr(output)
    );
}

/// Initialize an exchange with the given participants.
fn exchange_with(names: &str) -> TempDir {
    let temp = TempDir::new().unwrap();
    assert_ok(&run_sg(temp.path(), &["init"]));
    assert_ok(&run_sg(temp.path(), &["participant", "add", names]));
    temp
}

fn write_face(dir: &Path, file: &str, values: &str) -> String {
    let path = dir.join(file);
    fs::write(&path, values).unwrap();
    path.display().to_string()
}

// =============================================================================
// Basic command tests
// =============================================================================

#[test]
fn test_help() {
    let temp = TempDir::new().unwrap();
    let output = run_sg(temp.path(), &["--help"]);
    assert_ok(&output);
    let out = stdout(&output);
    assert!(out.contains("participant"));
    assert!(out.contains("reveal"));
}

#[test]
fn test_commands_require_init() {
    let temp = TempDir::new().unwrap();
    let output = run_sg(temp.path(), &["status"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("sg init"));
}

#[test]
fn test_init_creates_gift_folder() {
    let temp = TempDir::new().unwrap();
    let output = run_sg(temp.path(), &["init"]);
    assert_ok(&output);
    assert!(temp.path().join(".gift").join("exchange.json").exists());
    assert!(temp.path().join(".gift").join("manifest.json").exists());

    let again = run_sg(temp.path(), &["init"]);
    assert_ok(&again);
    assert!(stdout(&again).contains("already exists"));
}

// =============================================================================
// Participants and rules
// =============================================================================

#[test]
fn test_participant_lifecycle() {
    let temp = exchange_with("Ann, Bob, Cid");

    let list = run_sg(temp.path(), &["participant", "list"]);
    assert_ok(&list);
    assert_eq!(stdout(&list).lines().collect::<Vec<_>>(), vec!["Ann", "Bob", "Cid"]);

    assert_ok(&run_sg(temp.path(), &["participant", "rename", "Ann", "Anna"]));
    assert_ok(&run_sg(temp.path(), &["participant", "remove", "Cid"]));

    let list = run_sg(temp.path(), &["participant", "list"]);
    assert_eq!(stdout(&list).lines().collect::<Vec<_>>(), vec!["Anna", "Bob"]);

    let dup = run_sg(temp.path(), &["participant", "rename", "Anna", "Bob"]);
    assert!(!dup.status.success());
    assert!(stderr(&dup).contains("already exists"));
}

#[test]
fn test_rule_conflicts_are_reported() {
    let temp = exchange_with("Ann, Bob, Cid");

    assert_ok(&run_sg(temp.path(), &["rule", "restrict", "Ann", "Bob"]));
    let conflict = run_sg(temp.path(), &["rule", "mandate", "Ann", "Bob"]);
    assert!(!conflict.status.success());

    let self_rule = run_sg(temp.path(), &["rule", "restrict", "Ann", "Ann"]);
    assert!(!self_rule.status.success());

    let list = run_sg(temp.path(), &["rule", "list"]);
    assert_ok(&list);
    let out = stdout(&list);
    assert!(out.contains("Ann ↛ Bob"));
    assert_eq!(out.lines().count(), 1);

    assert_ok(&run_sg(temp.path(), &["rule", "unrestrict", "Ann", "Bob"]));
    assert!(stdout(&run_sg(temp.path(), &["rule", "list"])).contains("No rules"));
}

// =============================================================================
// Drawing and reveal
// =============================================================================

#[test]
fn test_setup_register_reveal() {
    let temp = exchange_with("Ann, Bob, Cid");
    let dir = temp.path();
    assert_ok(&run_sg(dir, &["rule", "restrict", "Ann", "Bob"]));

    let ann = write_face(dir, "ann.json", "[0.0, 0.0, 0.0]");
    assert_ok(&run_sg(dir, &["register", "Ann", "--vector", &ann]));
    assert_ok(&run_sg(dir, &["setup"]));

    let probe = write_face(dir, "probe.json", "[0.1, 0.0, 0.0]");
    let reveal = run_sg(dir, &["reveal", "Ann", "--probe", &probe]);
    assert_ok(&reveal);
    assert!(stdout(&reveal).contains("giving a gift to: Cid"));

    let status = run_sg(dir, &["status", "--json"]);
    assert_ok(&status);
    let json: serde_json::Value = serde_json::from_str(&stdout(&status)).unwrap();
    assert_eq!(json["setup_complete"], true);
    assert_eq!(json["participants"][0]["verified"], true);
}

#[test]
fn test_reveal_rejects_stranger() {
    let temp = exchange_with("Ann, Bob");
    let dir = temp.path();
    let ann = write_face(dir, "ann.json", "[0.0, 0.0]");
    assert_ok(&run_sg(dir, &["register", "Ann", "--vector", &ann]));
    assert_ok(&run_sg(dir, &["setup"]));

    let stranger = write_face(dir, "stranger.json", "[5.0, 5.0]");
    let reveal = run_sg(dir, &["reveal", "Ann", "--probe", &stranger]);
    assert!(!reveal.status.success());
    assert!(stderr(&reveal).contains("not recognized"));
}

#[test]
fn test_infeasible_setup_fails() {
    let temp = exchange_with("A, B");
    assert_ok(&run_sg(temp.path(), &["rule", "mandate", "A", "B"]));
    assert_ok(&run_sg(temp.path(), &["rule", "restrict", "B", "A"]));

    let output = run_sg(temp.path(), &["setup"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("no valid assignment"));
}

#[test]
fn test_shuffle_requires_setup() {
    let temp = exchange_with("Ann, Bob");
    let output = run_sg(temp.path(), &["shuffle"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Setup is not complete"));
}

// =============================================================================
// Face backups and config
// =============================================================================

#[test]
fn test_faces_export_and_list() {
    let temp = exchange_with("Ann, Bob");
    let dir = temp.path();
    let ann = write_face(dir, "ann.json", "[1.0]");
    assert_ok(&run_sg(dir, &["register", "Ann", "--vector", &ann]));

    let export = run_sg(dir, &["faces", "export"]);
    assert_ok(&export);
    assert!(stdout(&export).contains("Exported 1 faces"));

    let list = run_sg(dir, &["faces", "list"]);
    assert_ok(&list);
    assert!(stdout(&list).contains("face_data_backup_"));
}

#[test]
fn test_config_set_and_get() {
    let temp = TempDir::new().unwrap();

    assert_ok(&run_sg(temp.path(), &["config", "set", "retry-budget", "42"]));
    let get = run_sg(temp.path(), &["config", "get", "retry_budget"]);
    assert_ok(&get);
    assert_eq!(stdout(&get).trim(), "42");

    let bad = run_sg(temp.path(), &["config", "set", "strategy", "greedy"]);
    assert!(!bad.status.success());

    let path = run_sg(temp.path(), &["config", "path"]);
    assert!(stdout(&path).contains("config.json"));
}
