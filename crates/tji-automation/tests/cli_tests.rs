//! Exit status and argument handling of the `sheet-checker` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn sheet_checker() -> Command {
    let mut cmd = Command::cargo_bin("sheet-checker").unwrap();
    cmd.env_remove("SHEET_CHECKER_CONFIG")
        .env("LOG_OUTPUT", "console")
        .env("LOG_LEVEL", "error");
    cmd
}

#[test]
fn test_no_arguments_is_usage_error() {
    sheet_checker().assert().code(2);
}

#[test]
fn test_run_requires_config() {
    sheet_checker()
        .arg("run")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--config"));
}

#[test]
fn test_missing_config_file_fails() {
    sheet_checker()
        .args(["run", "--config", "/nonexistent/config.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_invalid_log_output_is_reported() {
    // Falls back to console + ./logs, so keep the log directory out of the tree
    let workdir = tempfile::tempdir().unwrap();
    sheet_checker()
        .current_dir(workdir.path())
        .env("LOG_OUTPUT", "syslog")
        .args(["run", "--config", "/nonexistent/config.yaml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ignoring logging environment: Invalid log output: syslog"))
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_unknown_dataset_fails_before_any_io() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(
        config,
        r#"
Email Settings:
  sender: data@texasjusticeinitiative.org
  recipients: [team@texasjusticeinitiative.org]
Datasets:
  cdr:
    enabled: true
    sheet key: 1CdrKey
"#
    )
    .unwrap();

    sheet_checker()
        .args(["run", "--dataset", "nope", "--config"])
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Unknown dataset: nope"));
}

#[test]
fn test_no_enabled_datasets_is_success() {
    let mut config = tempfile::NamedTempFile::new().unwrap();
    write!(
        config,
        r#"
Email Settings:
  sender: data@texasjusticeinitiative.org
  recipients: [team@texasjusticeinitiative.org]
Datasets:
  cdr:
    enabled: false
    sheet key: 1CdrKey
"#
    )
    .unwrap();

    sheet_checker()
        .args(["run", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No enabled datasets"));
}
