//! direnv integration: shell library install, RC hook injection, allow.
//!
//! direnv is the trigger mechanism: it executes the managed `.envrc` block
//! on directory entry and scopes the exported variables to that session.
//! This module installs the two shell assets ghpin needs -
//!
//! - the direnv library defining `use_ghpin` / `use_ghpin_export`, placed
//!   where direnv auto-loads custom functions
//! - the shell hook that drives `ghpin hook eval` each prompt, sourced from
//!   the user's RC file through a managed block
//!
//! and answers the detection questions setup/doctor ask.

use crate::blockfile::{self, Markers};
use crate::{config, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Markers around the `source` line injected into the user's shell RC file.
pub const HOOK_MARKERS: Markers = Markers::new("# ghpin-hook:start", "# ghpin-hook:end");

/// Shell RC files and installed shell assets stay world-readable.
pub const RC_FILE_MODE: u32 = 0o644;

const SHELL_LIB: &str = include_str!("shell/ghpin.sh");
const SHELL_HOOK: &str = include_str!("shell/ghpin-hook.sh");

/// RC files scanned when detecting hook installation.
const RC_CANDIDATES: [&str; 4] = [".zshrc", ".bashrc", ".bash_profile", ".profile"];

/// Check if direnv is available in PATH.
pub fn is_installed() -> bool {
    Command::new("which")
        .arg("direnv")
        .output()
        .map(|out| out.status.success() && !out.stdout.is_empty())
        .unwrap_or(false)
}

/// The direnv version string.
pub fn get_version() -> Result<String> {
    let output = Command::new("direnv")
        .arg("version")
        .output()
        .map_err(|e| Error::PrerequisiteMissing(format!("direnv not found: {e}")))?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Run `direnv allow` on the directory's `.envrc`.
pub fn allow(dir: &Path) -> Result<()> {
    let envrc = dir.join(".envrc");
    let output = Command::new("direnv")
        .arg("allow")
        .arg(&envrc)
        .current_dir(dir)
        .output()
        .map_err(|e| Error::Other(format!("cannot run direnv allow: {e}")))?;

    if !output.status.success() {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        return Err(Error::Other(format!(
            "direnv allow failed: {}",
            text.trim()
        )));
    }
    Ok(())
}

/// direnv's lib directory, where custom shell functions are auto-loaded
/// from.
pub fn shell_lib_dir() -> Result<PathBuf> {
    Ok(config::xdg_config_home()?.join("direnv").join("lib"))
}

/// Full path of the installed direnv library.
pub fn shell_lib_path() -> Result<PathBuf> {
    Ok(shell_lib_dir()?.join("ghpin.sh"))
}

/// Full path of the installed shell hook script.
pub fn shell_hook_path() -> Result<PathBuf> {
    Ok(config::config_dir()?.join("hook.sh"))
}

/// Write the embedded direnv library into direnv's lib directory.
pub fn install_shell_lib() -> Result<PathBuf> {
    let lib_dir = shell_lib_dir()?;
    fs::create_dir_all(&lib_dir)
        .map_err(|e| Error::config_io("create direnv lib directory", &lib_dir, e))?;

    let dest = lib_dir.join("ghpin.sh");
    fs::write(&dest, SHELL_LIB).map_err(|e| Error::config_io("write shell library", &dest, e))?;
    blockfile::set_mode(&dest, RC_FILE_MODE)?;
    Ok(dest)
}

/// Write the embedded shell hook script into the config directory.
///
/// The hook creates `gh()`/`git()` wrapper functions when direnv sets the
/// `GHPIN_USER` marker.
pub fn install_shell_hook() -> Result<PathBuf> {
    let hook_path = shell_hook_path()?;
    let dir = hook_path.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(|e| Error::config_io("create config directory", dir, e))?;

    fs::write(&hook_path, SHELL_HOOK)
        .map_err(|e| Error::config_io("write hook script", &hook_path, e))?;
    blockfile::set_mode(&hook_path, RC_FILE_MODE)?;
    Ok(hook_path)
}

/// Add a `source <hook_path>` line to the given shell RC file, wrapped in
/// markers so it can be updated or removed later.
pub fn inject_hook_source(rc_path: &Path, hook_path: &Path) -> Result<()> {
    let body = format!("source \"{}\"", hook_path.display());
    blockfile::upsert(rc_path, &HOOK_MARKERS, &body, RC_FILE_MODE)
}

/// Check if the installed direnv library file exists.
pub fn is_shell_lib_installed() -> bool {
    shell_lib_path().map(|p| p.exists()).unwrap_or(false)
}

/// Check if the hook source block is present in any common RC file.
pub fn is_shell_hook_installed() -> bool {
    scan_rc_files(|content| content.contains(HOOK_MARKERS.start))
}

/// Look for the direnv hook itself in common shell config files.
pub fn check_direnv_hook() -> bool {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(home) = dirs::home_dir() {
        for name in RC_CANDIDATES {
            candidates.push(home.join(name));
        }
        candidates.push(home.join(".config").join("fish").join("config.fish"));
    }
    candidates.iter().any(|path| {
        fs::read_to_string(path)
            .map(|content| content.contains("direnv hook") || content.contains("direnv.fish"))
            .unwrap_or(false)
    })
}

fn scan_rc_files(pred: impl Fn(&str) -> bool) -> bool {
    let Some(home) = dirs::home_dir() else {
        return false;
    };
    RC_CANDIDATES.iter().any(|name| {
        fs::read_to_string(home.join(name))
            .map(|content| pred(&content))
            .unwrap_or(false)
    })
}

/// Find the user's active shell RC file: `$SHELL` suffix first, then the
/// first RC candidate that exists.
pub fn detect_shell_rc() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Other("cannot determine home directory".to_string()))?;

    let shell = std::env::var("SHELL").unwrap_or_default();
    if shell.ends_with("/zsh") {
        return Ok(home.join(".zshrc"));
    }
    if shell.ends_with("/bash") {
        return Ok(home.join(".bashrc"));
    }

    for name in RC_CANDIDATES {
        let path = home.join(name);
        if path.exists() {
            return Ok(path);
        }
    }

    Err(Error::Other(format!(
        "could not detect shell RC file (SHELL={shell})"
    )))
}
