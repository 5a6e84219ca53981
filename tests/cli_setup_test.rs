//! Integration tests for `setup`, driven by stub `gh`/`direnv` executables
//! on a controlled PATH. The stubs answer exactly the queries the real
//! tools would, which lets the full install + validate + migrate flow run
//! in isolation.

#![cfg(unix)]

mod common;

use common::{parse_json, TestEnv};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_setup_fails_without_gh() {
    let env = TestEnv::new();
    let empty = common::TempDir::new().unwrap();

    env.ghpin()
        .env("PATH", empty.path())
        .arg("setup")
        .assert()
        .failure()
        .stderr(predicate::str::contains("gh CLI not found"));
}

#[test]
fn test_setup_installs_shell_integration() {
    let env = TestEnv::new();
    let path = env.install_stub_tools();

    let output = env
        .ghpin()
        .env("PATH", &path)
        .env("SHELL", "/bin/bash")
        .arg("setup")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = parse_json(&output);
    assert_eq!(json["gh_version"], "2.86.0");
    assert_eq!(json["direnv_version"], "2.34.0");
    assert_eq!(json["accounts"][0]["user"], "alice");
    assert_eq!(json["accounts"][0]["active"], true);

    // The direnv library landed where direnv auto-loads functions from.
    let lib = env
        .home_dir
        .path()
        .join(".config/direnv/lib/ghpin.sh");
    assert!(lib.exists());
    let lib_content = fs::read_to_string(&lib).unwrap();
    assert!(lib_content.contains("use_ghpin()"));
    assert!(lib_content.contains("use_ghpin_export()"));

    // The shell hook landed in the config dir and is sourced from .bashrc
    // inside a managed block.
    let hook = env.config_dir.path().join("hook.sh");
    assert!(hook.exists());
    assert!(fs::read_to_string(&hook).unwrap().contains("ghpin hook eval"));

    let rc = fs::read_to_string(env.home_dir.path().join(".bashrc")).unwrap();
    assert!(rc.contains("# ghpin-hook:start"));
    assert!(rc.contains(&hook.to_string_lossy().into_owned()));
    assert!(rc.contains("# ghpin-hook:end"));
}

#[test]
fn test_setup_is_idempotent_on_rc_file() {
    let env = TestEnv::new();
    let path = env.install_stub_tools();
    fs::write(env.home_dir.path().join(".bashrc"), "export A=1\n").unwrap();

    for _ in 0..2 {
        env.ghpin()
            .env("PATH", &path)
            .env("SHELL", "/bin/bash")
            .arg("setup")
            .assert()
            .success();
    }

    let rc = fs::read_to_string(env.home_dir.path().join(".bashrc")).unwrap();
    assert!(rc.starts_with("export A=1\n"));
    assert_eq!(rc.matches("# ghpin-hook:start").count(), 1);
}

#[test]
fn test_pin_validates_against_gh() {
    let env = TestEnv::new();
    let path = env.install_stub_tools();
    env.install_shell_lib_stub();

    // With a working gh on PATH, validation passes without --no-validate.
    let output = env
        .ghpin()
        .env("PATH", &path)
        .args(["pin", "alice"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert_eq!(parse_json(&output)["validated"], true);
}

#[test]
fn test_pin_validation_failure_blocks_pin() {
    let env = TestEnv::new();
    let empty = common::TempDir::new().unwrap();
    env.install_shell_lib_stub();

    env.ghpin()
        .env("PATH", format!("{}:/usr/bin:/bin", empty.path().display()))
        .args(["pin", "alice"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("alice"));

    // A failed validation never writes a partial pin.
    assert!(!env.pins_path().exists());
}

#[test]
fn test_hook_run_injects_token_into_child_only() {
    let env = TestEnv::new();
    let path = env.install_stub_tools();

    // `env` prints its environment: the stub token must be there.
    env.ghpin()
        .env("PATH", &path)
        .args(["hook", "run", "--account", "alice", "env"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GH_TOKEN=ghp_stubtoken1234567890"))
        .stdout(predicate::str::contains(
            "GITHUB_TOKEN=ghp_stubtoken1234567890",
        ));
}

#[test]
fn test_setup_migrate_normalizes_pins_and_rewrites_envrc() {
    let env = TestEnv::new();
    let path = env.install_stub_tools();

    // A legacy pin: no mode, stale .envrc content.
    fs::create_dir_all(env.config_dir.path()).unwrap();
    fs::write(
        env.pins_path(),
        format!(
            "[[pins]]\nuser = \"alice\"\ndir = \"{}\"\n",
            env.work_path().display()
        ),
    )
    .unwrap();
    fs::write(env.envrc_path(), "# ghpin:start\nuse_ghpin old\n# ghpin:end\n").unwrap();

    let output = env
        .ghpin()
        .env("PATH", &path)
        .env("SHELL", "/bin/bash")
        .args(["setup", "--migrate"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = parse_json(&output);
    assert_eq!(json["migration"]["pins_updated"], 1);
    assert_eq!(json["migration"]["envrc_rewritten"], 1);
    assert_eq!(json["migration"]["allowed"], 1);

    // Mode normalized on disk, .envrc regenerated from the registry.
    assert!(fs::read_to_string(env.pins_path()).unwrap().contains("wrapper"));
    let envrc = fs::read_to_string(env.envrc_path()).unwrap();
    assert!(envrc.contains("use_ghpin alice"));
    assert!(!envrc.contains("use_ghpin old"));
}

#[test]
fn test_doctor_fix_runs_migration() {
    let env = TestEnv::new();
    let path = env.install_stub_tools();

    let output = env
        .ghpin()
        .env("PATH", &path)
        .env("SHELL", "/bin/bash")
        .args(["doctor", "--fix"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    // --fix delegates to setup --migrate.
    let json = parse_json(&output);
    assert!(json.get("migration").is_some());
    assert!(env.config_dir.path().join("hook.sh").exists());
}
