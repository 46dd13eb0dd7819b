//! Integration tests for the `awc` binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const TRIAGE: &str = r"---
on:
  issues:
    types: [opened]
  stop-after: +24h
imports:
  - shared/tone.md
safe-outputs:
  add-comment:
---

# Triage

Triage issue #${{ github.event.issue.number }}.
";

const TONE: &str = "---\nenv:\n  TONE: friendly\n---\nKeep replies short.\n";

const REFERENCE_TIME: &str = "2025-06-01T09:00:00Z";

fn create_workflows() -> TempDir {
    let dir = tempfile::Builder::new()
        .prefix("awc_test_")
        .tempdir()
        .expect("Failed to create temp directory");
    fs::create_dir(dir.path().join("shared")).unwrap();
    fs::write(dir.path().join("shared/tone.md"), TONE).unwrap();
    fs::write(dir.path().join("triage.md"), TRIAGE).unwrap();
    dir
}

fn awc() -> Command {
    #[allow(deprecated)]
    let mut cmd = Command::cargo_bin("awc").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("AWC_LOG_LEVEL")
        .env_remove("AWC_LOG_FORMAT");
    cmd
}

fn compile_at(path: &Path) -> String {
    awc()
        .args(["compile", "--now", REFERENCE_TIME])
        .arg(path)
        .assert()
        .success();
    fs::read_to_string(path.with_file_name("triage.lock.yml")).unwrap()
}

#[test]
fn test_compile_writes_lock_file() {
    let dir = create_workflows();
    awc()
        .args(["compile", "--now", REFERENCE_TIME])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Compiled").and(predicate::str::contains("triage.lock.yml")));

    let yaml = fs::read_to_string(dir.path().join("triage.lock.yml")).unwrap();
    assert!(yaml.starts_with("# Generated by awc"));
    assert!(yaml.contains("Keep replies short."));

    let document: serde_yaml::Value = serde_yaml::from_str(&yaml).unwrap();
    assert!(document["jobs"]["safe_outputs"].is_mapping());
    assert_eq!(document["jobs"]["agent"]["env"]["TONE"].as_str(), Some("friendly"));
}

#[test]
fn test_compile_is_deterministic_with_reference_time() {
    let dir = create_workflows();
    let source = dir.path().join("triage.md");
    let first = compile_at(&source);
    let second = compile_at(&source);
    assert_eq!(first, second);
}

#[test]
fn test_compile_into_output_dir() {
    let dir = create_workflows();
    let out = dir.path().join("out");
    awc()
        .arg("compile")
        .arg(dir.path().join("triage.md"))
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success();
    assert!(out.join("triage.lock.yml").is_file());
    assert!(!dir.path().join("triage.lock.yml").exists());
}

#[test]
fn test_validate_writes_nothing() {
    let dir = create_workflows();
    awc()
        .arg("validate")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Valid"));
    assert!(!dir.path().join("triage.lock.yml").exists());
}

#[test]
fn test_invalid_workflow_fails_with_diagnostic() {
    let dir = create_workflows();
    fs::write(
        dir.path().join("broken.md"),
        "---\non:\n  command: triage\n  issues:\n---\nBroken.\n",
    )
    .unwrap();

    awc()
        .arg("compile")
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("1 of 2 workflow(s) failed"));

    assert!(dir.path().join("triage.lock.yml").is_file());
    assert!(!dir.path().join("broken.lock.yml").exists());
}

#[test]
fn test_missing_path_is_config_error() {
    awc()
        .args(["validate", "/nope.md"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("exist"));
}

#[test]
fn test_json_output() {
    let dir = create_workflows();
    let output = awc()
        .args(["--json", "validate"])
        .arg(dir.path().join("triage.md"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let line = String::from_utf8(output.stdout).unwrap();
    let report: serde_yaml::Value = serde_yaml::from_str(line.trim()).unwrap();
    let jobs: Vec<&str> = report["jobs"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(serde_yaml::Value::as_str)
        .collect();
    assert_eq!(
        jobs,
        vec!["pre_activation", "activation", "agent", "detection", "safe_outputs", "conclusion"]
    );
    assert!(report["warnings"].as_sequence().unwrap().is_empty());
}

#[test]
fn test_missing_import_is_a_warning() {
    let dir = create_workflows();
    fs::remove_file(dir.path().join("shared/tone.md")).unwrap();
    awc()
        .arg("compile")
        .arg(dir.path().join("triage.md"))
        .assert()
        .success()
        .stderr(predicate::str::contains("warning:").and(predicate::str::contains("shared/tone.md")));
}

#[test]
fn test_schema_conformance_failure() {
    let dir = create_workflows();
    let schema = dir.path().join("schema.json");
    fs::write(&schema, r#"{"type": "object", "required": ["permissions", "defaults"]}"#).unwrap();

    awc()
        .arg("validate")
        .arg(dir.path().join("triage.md"))
        .arg("--schema")
        .arg(&schema)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("conform"));
}

#[test]
fn test_unreadable_schema_is_config_error() {
    let dir = create_workflows();
    awc()
        .arg("validate")
        .arg(dir.path())
        .arg("--schema")
        .arg(dir.path().join("missing.json"))
        .assert()
        .code(2);
}
