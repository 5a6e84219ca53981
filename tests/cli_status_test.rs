//! Integration tests for the `status` command.

mod common;

use common::{parse_json, TestEnv};
use predicates::prelude::*;

#[test]
fn test_status_without_pin() {
    let env = TestEnv::new();

    let output = env
        .ghpin()
        .arg("status")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = parse_json(&output);
    assert_eq!(
        json["dir"],
        env.work_path().to_string_lossy().into_owned()
    );
    assert!(json.get("pin").is_none() || json["pin"].is_null());
}

#[test]
fn test_status_reports_pinned_context() {
    let env = TestEnv::new();
    env.install_shell_lib_stub();
    env.ghpin()
        .args([
            "pin",
            "bob-work",
            "--no-validate",
            "--git-email",
            "bob@co.com",
        ])
        .assert()
        .success();

    let output = env
        .ghpin()
        .arg("status")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = parse_json(&output);
    assert_eq!(json["pin"]["user"], "bob-work");
    assert_eq!(json["pin"]["mode"], "wrapper");
    assert_eq!(json["pin"]["git_email"], "bob@co.com");
}

#[test]
fn test_status_masks_tokens() {
    let env = TestEnv::new();

    let output = env
        .ghpin()
        .env("GH_TOKEN", "ghp_secretvalue1234")
        .arg("status")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let text = String::from_utf8_lossy(&output);
    assert!(!text.contains("ghp_secretvalue1234"));
    let json = parse_json(&output);
    assert_eq!(json["environment"]["gh_token"], "ghp_****1234");
}

#[test]
fn test_status_notes_unpinned_token() {
    let env = TestEnv::new();

    let output = env
        .ghpin()
        .env("GH_TOKEN", "ghp_secretvalue1234")
        .arg("status")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = parse_json(&output);
    let diagnostics = json["diagnostics"].as_array().unwrap();
    assert!(
        diagnostics
            .iter()
            .any(|d| d.as_str().unwrap().contains("no pin")),
        "expected a no-pin diagnostic, got: {diagnostics:?}"
    );
}

#[test]
fn test_status_human_output() {
    let env = TestEnv::new();

    env.ghpin()
        .args(["-H", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Directory:"))
        .stdout(predicate::str::contains("Pinned account:   (none)"))
        .stdout(predicate::str::contains("GH_TOKEN:           (not set)"));
}
