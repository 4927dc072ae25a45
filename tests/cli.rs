//! Command line behavior that does not need a provisioned build host.
//!
//! Every case here fails before the first external command runs.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

fn minecart(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("minecart").unwrap();
    cmd.current_dir(dir.path());
    cmd
}

fn valid_manifest() -> serde_json::Value {
    json!({
        "name": "myapp",
        "maintainer": "Ops <ops@example.com>",
        "vendor": "Example",
        "url": "https://example.com",
        "user": "deploy",
        "install_directory": "/srv/apps",
        "install_deps": ["libssl"],
        "build_deps": [],
        "configuration_files": ["config/database.yml"],
        "instructions": ["touch marker"]
    })
}

fn write_manifest(dir: &TempDir, body: &str) {
    std::fs::write(dir.path().join("app.json"), body).unwrap();
}

#[test]
fn help_lists_flags() {
    let dir = TempDir::new().unwrap();
    minecart(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"))
        .stdout(predicate::str::contains("--keep-workdir"))
        .stdout(predicate::str::contains("--skip-provision"));
}

#[test]
fn missing_argument_fails_with_usage() {
    let dir = TempDir::new().unwrap();
    minecart(&dir)
        .assert()
        .failure()
        .stderr(predicate::str::contains("MANIFEST"));
}

#[test]
fn unreadable_manifest_is_usage_error() {
    let dir = TempDir::new().unwrap();
    minecart(&dir)
        .arg("missing.json")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("Failed [usage]"))
        .stderr(predicate::str::contains("pass package manifest as argument"));
}

#[test]
fn non_json_manifest_is_usage_error() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "name = \"myapp\"");
    minecart(&dir)
        .arg("app.json")
        .assert()
        .code(64)
        .stderr(predicate::str::contains("pass package manifest as argument"));
}

#[test]
fn missing_field_names_the_field() {
    let dir = TempDir::new().unwrap();
    let mut data = valid_manifest();
    data.as_object_mut().unwrap().remove("vendor");
    write_manifest(&dir, &data.to_string());

    minecart(&dir)
        .arg("app.json")
        .assert()
        .code(65)
        .stderr(predicate::str::contains("Failed [validation]"))
        .stderr(predicate::str::contains("\"vendor\""))
        .stderr(predicate::str::contains("missing parameter"));
}

#[test]
fn scalar_list_field_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut data = valid_manifest();
    data["instructions"] = json!("make all");
    write_manifest(&dir, &data.to_string());

    minecart(&dir)
        .arg("app.json")
        .assert()
        .code(65)
        .stderr(predicate::str::contains("\"instructions\""));
}

#[test]
fn validation_failure_leaves_no_build_log() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, "{}");

    minecart(&dir).arg("app.json").assert().code(65);

    let logs: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("build-"))
        .collect();
    assert!(logs.is_empty());
}

#[test]
fn malformed_release_id_is_usage_error() {
    let dir = TempDir::new().unwrap();
    write_manifest(&dir, &valid_manifest().to_string());

    minecart(&dir)
        .args(["app.json", "--release-id", "2024-01-01"])
        .assert()
        .code(64);
}
