//! CLI integration tests for config-normalize.
//!
//! These tests verify command-line argument parsing, help output,
//! offline commands, and exit codes for configuration errors.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the config-normalize binary.
fn cmd() -> Command {
    Command::cargo_bin("config-normalize").unwrap()
}

fn valid_config() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "target:").unwrap();
    writeln!(file, "  host: localhost").unwrap();
    writeln!(file, "  database: airbyte").unwrap();
    writeln!(file, "  user: docker").unwrap();
    writeln!(file, "  schema: airbyte").unwrap();
    file
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("verify"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--force"))
        .stdout(predicate::str::contains("--skip-verify"))
        .stdout(predicate::str::contains("--target-schema"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("config-normalize"));
}

// =============================================================================
// Global Flags Tests
// =============================================================================

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--progress"))
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"))
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

// =============================================================================
// Exit Code Tests
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1);
}

#[test]
fn test_unsupported_ssl_mode_exits_with_code_1() {
    let mut file = valid_config();
    writeln!(file, "  ssl_mode: require").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ssl_mode"));
}

#[test]
fn test_bad_target_schema_override_exits_with_code_1() {
    let file = valid_config();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--target-schema",
            "bad schema;",
        ])
        .assert()
        .code(1);
}

// =============================================================================
// Plan
// =============================================================================

#[test]
fn test_plan_prints_ddl_without_connecting() {
    let file = valid_config();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "plan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-- 0.32.8.001"))
        .stdout(predicate::str::contains("-- checksum: "))
        .stdout(predicate::str::contains(
            "CREATE TYPE \"airbyte\".\"actor_type\" AS ENUM ('source', 'destination')",
        ))
        .stdout(predicate::str::contains(
            "CREATE TABLE IF NOT EXISTS \"airbyte\".\"connection_operation\"",
        ))
        .stdout(predicate::str::contains("CREATE INDEX IF NOT EXISTS"));
}

#[test]
fn test_plan_is_stable() {
    let file = valid_config();
    let path = file.path().to_str().unwrap().to_string();

    let first = cmd().args(["--config", &path, "plan"]).output().unwrap();
    let second = cmd().args(["--config", &path, "plan"]).output().unwrap();
    assert!(first.status.success());
    assert_eq!(first.stdout, second.stdout);
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test database connections"));
}

#[test]
fn test_verify_command_exists() {
    cmd()
        .args(["verify", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Compare the normalized tables"));
}

#[test]
fn test_short_config_flag() {
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
