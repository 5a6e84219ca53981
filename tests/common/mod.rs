//! Common test utilities for ghpin integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's real `~/.config/ghpin`, home directory, or shell RC files.

#![allow(dead_code)]

use assert_cmd::Command;
use std::fs;
use std::path::{Path, PathBuf};
pub use tempfile::TempDir;

/// A test environment with isolated config, home, and working directories.
///
/// Each `TestEnv` creates three temporary directories:
/// - `config_dir`: ghpin's config (via `GHPIN_CONFIG_DIR`)
/// - `home_dir`: acts as `$HOME` / `$XDG_CONFIG_HOME` / `$XDG_DATA_HOME`
/// - `work_dir`: the directory commands run from (and pin by default)
///
/// The `ghpin()` method returns a `Command` with the isolation env vars set
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub config_dir: TempDir,
    pub home_dir: TempDir,
    pub work_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with isolated directories.
    pub fn new() -> Self {
        Self {
            config_dir: TempDir::new().unwrap(),
            home_dir: TempDir::new().unwrap(),
            work_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the ghpin binary with isolated directories.
    pub fn ghpin(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_ghpin"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("GHPIN_CONFIG_DIR", self.config_dir.path());
        cmd.env("HOME", self.home_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.home_dir.path().join(".config"));
        cmd.env("XDG_DATA_HOME", self.home_dir.path().join(".local/share"));
        // Shell signals must not leak in from the developer's session.
        cmd.env_remove("GHPIN_USER");
        cmd.env_remove("GH_TOKEN");
        cmd.env_remove("GITHUB_TOKEN");
        cmd.env_remove("GHPIN_HOOK_STATE");
        cmd
    }

    /// Path to the working (pinnable) directory.
    pub fn work_path(&self) -> &Path {
        self.work_dir.path()
    }

    /// Path to the pin registry file.
    pub fn pins_path(&self) -> PathBuf {
        self.config_dir.path().join("pins.toml")
    }

    /// Path to the working directory's `.envrc`.
    pub fn envrc_path(&self) -> PathBuf {
        self.work_dir.path().join(".envrc")
    }

    /// Path to the action log inside the isolated data dir.
    pub fn action_log_path(&self) -> PathBuf {
        self.home_dir
            .path()
            .join(".local/share/ghpin/action.log")
    }

    /// Create the direnv shell library file, satisfying the `pin`
    /// prerequisite check without running `setup`.
    pub fn install_shell_lib_stub(&self) {
        let lib_dir = self.home_dir.path().join(".config/direnv/lib");
        fs::create_dir_all(&lib_dir).unwrap();
        fs::write(lib_dir.join("ghpin.sh"), "# stub\n").unwrap();
    }

    /// Mark the shell hook as configured by writing a marked `.bashrc`.
    pub fn install_shell_hook_stub(&self) {
        fs::write(
            self.home_dir.path().join(".bashrc"),
            "# ghpin-hook:start\nsource \"/stub/hook.sh\"\n# ghpin-hook:end\n",
        )
        .unwrap();
    }

    /// Install stub `gh` and `direnv` executables and return a PATH value
    /// that resolves them (plus the system shells).
    ///
    /// The stub gh answers `--version`, `auth status`, and
    /// `auth token --user <user>` the way a logged-in gh 2.x does.
    #[cfg(unix)]
    pub fn install_stub_tools(&self) -> String {
        use std::os::unix::fs::PermissionsExt;

        let bin_dir = self.home_dir.path().join("stub-bin");
        fs::create_dir_all(&bin_dir).unwrap();

        let gh = bin_dir.join("gh");
        fs::write(
            &gh,
            r#"#!/bin/sh
case "$1" in
--version)
    echo "gh version 2.86.0 (2025-01-01)"
    ;;
auth)
    case "$2" in
    token)
        echo "ghp_stubtoken1234567890"
        ;;
    status)
        cat <<'EOF'
github.com
  ✓ Logged in to github.com account alice (keyring)
  - Active account: true
  - Git operations protocol: https
EOF
        ;;
    esac
    ;;
esac
"#,
        )
        .unwrap();
        fs::set_permissions(&gh, fs::Permissions::from_mode(0o755)).unwrap();

        let direnv = bin_dir.join("direnv");
        fs::write(
            &direnv,
            r#"#!/bin/sh
case "$1" in
version) echo "2.34.0" ;;
allow) exit 0 ;;
esac
"#,
        )
        .unwrap();
        fs::set_permissions(&direnv, fs::Permissions::from_mode(0o755)).unwrap();

        format!("{}:/usr/bin:/bin", bin_dir.display())
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse JSON output from a command.
pub fn parse_json(output: &[u8]) -> serde_json::Value {
    serde_json::from_slice(output).expect("Failed to parse JSON output")
}
