//! CLI Integration Tests
//!
//! These tests verify the CLI commands work correctly end-to-end.
//! They test the "wiring" between the CLI and the core library.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

fn cli_cmd() -> Command {
    let mut cmd = Command::cargo_bin("scenesync").expect("Failed to find scenesync binary");
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Run the demo with extra args and return stdout
fn demo_output(args: &[&str]) -> String {
    let output = cli_cmd().args(args).output().unwrap();
    assert!(output.status.success(), "demo failed: {:?}", output);
    String::from_utf8(output.stdout).unwrap()
}

fn count_method(output: &str, method: &str) -> usize {
    let needle = format!("\"method\":\"{}\"", method);
    output.lines().filter(|l| l.contains(&needle)).count()
}

// ============================================================================
// Schema Command Tests
// ============================================================================

#[test]
fn test_schema_lists_types() {
    cli_cmd()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("Scene types (33)"))
        .stdout(predicate::str::contains("PlainBufferGeometry"))
        .stdout(predicate::str::contains("RendererModel"));
}

#[test]
fn test_schema_shows_fields() {
    cli_cmd()
        .args(["schema", "Mesh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Mesh (MeshModel)"))
        .stdout(predicate::str::contains("geometry"))
        .stdout(predicate::str::contains("position"));
}

#[test]
fn test_schema_shows_array_and_range() {
    cli_cmd()
        .args(["schema", "PlainBufferGeometry"])
        .assert()
        .success()
        .stdout(predicate::str::contains("vertices"))
        .stdout(predicate::str::contains("# Vertex colors"));

    cli_cmd()
        .args(["schema", "MeshLambertMaterial"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[0..=1]"));
}

#[test]
fn test_schema_unknown_type_fails() {
    cli_cmd()
        .args(["schema", "Teapot"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown type 'Teapot'"));
}

// ============================================================================
// Demo Command Tests
// ============================================================================

#[test]
fn test_demo_opens_scene_leaves_first() {
    let output = demo_output(&["demo"]);
    assert!(output.contains("# 14 handshakes"));
    assert_eq!(count_method(&output, "handshake"), 14);

    let handshakes: Vec<&str> = output
        .lines()
        .filter(|l| l.contains("\"method\":\"handshake\""))
        .collect();
    assert!(handshakes.last().unwrap().contains("RendererModel"));
    assert!(handshakes[0].contains("AmbientLightModel"));
}

#[test]
fn test_demo_batches_one_update_per_object() {
    let output = demo_output(&["demo", "--frames", "2"]);
    assert!(output.contains("# frame 2"));
    // mesh + material per frame
    assert_eq!(count_method(&output, "update"), 4);
    assert!(output.contains("<- camera applied [\"position\"]"));
}

#[test]
fn test_demo_eager_flushes_every_write() {
    let output = demo_output(&["demo", "--eager"]);
    assert_eq!(count_method(&output, "update"), 4);
}

#[test]
fn test_demo_tears_down_every_object() {
    let output = demo_output(&["demo", "--frames", "0"]);
    assert_eq!(count_method(&output, "teardown"), 14);
    assert!(output.contains("demo finished"));
}

#[test]
fn test_demo_prints_events() {
    cli_cmd()
        .args(["demo", "--events"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# events"))
        .stdout(predicate::str::contains("TornDown"));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_file_sets_flush_policy() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sync.json");
    std::fs::write(&path, r#"{"flush_policy": "eager"}"#).unwrap();

    let output = demo_output(&["--config", path.to_str().unwrap(), "demo"]);
    assert_eq!(count_method(&output, "update"), 4);
}

#[test]
fn test_invalid_config_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sync.json");
    std::fs::write(&path, r#"{"flush_policy": "sometimes"}"#).unwrap();

    cli_cmd()
        .args(["--config", path.to_str().unwrap(), "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config"));
}

#[test]
fn test_missing_config_fails() {
    cli_cmd()
        .args(["--config", "/nonexistent/sync.json", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}
