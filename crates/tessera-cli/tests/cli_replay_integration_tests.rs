//! CLI replay integration tests
//!
//! These tests run the built binary against scenario files written to a
//! temporary directory and inspect the JSON report it prints.

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::TempDir;

const TEMPLATES: &str = r#"[
    { "id": "site", "handler_type": "SiteHandler", "kind": "resource",
      "attachments": { "home": "page", "blog": "blog" } },
    { "id": "page", "handler_type": "PageHandler", "kind": "resource" },
    { "id": "blog", "handler_type": "BlogHandler", "kind": "container",
      "member_template": "post", "membership_aware": true },
    { "id": "post", "handler_type": "PostHandler", "kind": "resource" }
]"#;

const RESOURCES: &str = r#"[
    { "id": { "name": "s1", "template_id": "site" } },
    { "id": { "name": "news", "template_id": "blog" },
      "parent": { "name": "s1", "template_id": "site" }, "attachment": "blog" },
    { "id": { "name": "p1", "template_id": "post" },
      "parent": { "name": "news", "template_id": "blog" } },
    { "id": { "name": "p2", "template_id": "post" },
      "parent": { "name": "news", "template_id": "blog" } }
]"#;

fn write_scenario(temp_dir: &TempDir, steps: &str) -> PathBuf {
    let path = temp_dir.path().join("scenario.json");
    let content = format!(
        r#"{{ "templates": {}, "resources": {}, "steps": {} }}"#,
        TEMPLATES, RESOURCES, steps
    );
    fs::write(&path, content).unwrap();
    path
}

fn run_replay(args: &[&str]) -> std::process::Output {
    let cli_bin = env!("CARGO_BIN_EXE_tessera");
    Command::new(cli_bin)
        .arg("replay")
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute CLI")
}

fn mutations(report: &serde_json::Value) -> Vec<String> {
    report["repository_calls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|call| call["call"].as_str().unwrap().to_string())
        .filter(|call| !call.starts_with("find_") && call != "load_resource")
        .collect()
}

#[test]
fn test_cli_replay_add_member_saves() {
    // Scenario: find the blog, add m1, save
    // Then: one add_member call, one commit
    let temp_dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &temp_dir,
        r#"[
            { "op": "find", "name": "news", "handler": "BlogHandler", "as": "blog" },
            { "op": "add_member", "container": "blog", "name": "m1" }
        ]"#,
    );

    let output = run_replay(&[scenario.to_str().unwrap()]);

    assert!(
        output.status.success(),
        "CLI failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "saved");
    assert_eq!(report["commits"], 1);
    assert_eq!(mutations(&report), vec!["add_member"]);
    assert_eq!(report["changes"]["created"][0]["name"], "m1");
}

#[test]
fn test_cli_replay_delete_container_detaches_once() {
    let temp_dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &temp_dir,
        r#"[
            { "op": "find", "name": "news", "handler": "BlogHandler", "as": "blog" },
            { "op": "delete", "target": "blog" }
        ]"#,
    );

    let output = run_replay(&[scenario.to_str().unwrap()]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(mutations(&report), vec!["detach"]);
    let deleted: Vec<_> = report["changes"]["deleted"]
        .as_array()
        .unwrap()
        .iter()
        .map(|id| id["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(deleted, vec!["p1", "p2", "news"]);
}

#[test]
fn test_cli_replay_discard_makes_no_mutations() {
    let temp_dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &temp_dir,
        r#"[
            { "op": "find", "name": "s1", "handler": "SiteHandler", "as": "site" },
            { "op": "create_attachment", "owner": "site", "attachment": "home",
              "name": "home", "handler": "PageHandler", "as": "home" },
            { "op": "modify", "target": "home" }
        ]"#,
    );

    let output = run_replay(&[scenario.to_str().unwrap(), "--discard"]);

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["outcome"], "discarded");
    assert_eq!(report["rollbacks"], 1);
    assert_eq!(report["commits"], 0);
    assert!(mutations(&report).is_empty());
}

#[test]
fn test_cli_replay_failing_step_exits_nonzero() {
    let temp_dir = TempDir::new().unwrap();
    let scenario = write_scenario(
        &temp_dir,
        r#"[
            { "op": "find", "name": "s1", "handler": "SiteHandler", "as": "site" },
            { "op": "create_attachment", "owner": "site", "attachment": "sidebar",
              "name": "x", "handler": "PageHandler" }
        ]"#,
    );

    let output = run_replay(&[scenario.to_str().unwrap()]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error:"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_cli_replay_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("absent.json");

    let output = run_replay(&[missing.to_str().unwrap()]);

    assert!(!output.status.success());
}
