//! Configuration paths and the pin registry.
//!
//! ghpin keeps all of its persistent state in one directory:
//!
//! - `<config-dir>/pins.toml` - the pin registry (0600)
//! - `<config-dir>/hook.sh` - the installed shell hook (0644)
//!
//! The directory resolves to `$GHPIN_CONFIG_DIR` if set (test injection),
//! else `$XDG_CONFIG_HOME/ghpin`, else `~/.config/ghpin`, and is created
//! 0700 on first write because the registry names accounts and key paths.
//!
//! The registry file and each managed `.envrc` are shared across
//! concurrently running terminal sessions with no locking protocol:
//! concurrent whole-file writes race at last-writer-wins granularity.

pub mod pins;

pub use pins::{Pin, PinMode, PinRegistry};

use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Environment variable overriding the config directory (used by tests).
pub const CONFIG_DIR_ENV: &str = "GHPIN_CONFIG_DIR";

/// Required permissions for the config directory (owner only).
pub const CONFIG_DIR_MODE: u32 = 0o700;

/// Required permissions for the pin registry file (owner read/write only).
pub const REGISTRY_FILE_MODE: u32 = 0o600;

/// The ghpin config directory path.
///
/// Respects `GHPIN_CONFIG_DIR`, then `XDG_CONFIG_HOME`, defaulting to
/// `~/.config/ghpin`.
pub fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    Ok(xdg_config_home()?.join("ghpin"))
}

/// `$XDG_CONFIG_HOME`, defaulting to `~/.config`.
pub fn xdg_config_home() -> Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        if !dir.is_empty() {
            return Ok(PathBuf::from(dir));
        }
    }
    let home = dirs::home_dir()
        .ok_or_else(|| Error::Other("cannot determine home directory".to_string()))?;
    Ok(home.join(".config"))
}

/// Full path to the pins.toml registry file.
pub fn pins_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("pins.toml"))
}

/// Lexically absolute form of `path`.
///
/// Relative paths are joined to the current directory; `.` and `..`
/// components are resolved without touching the filesystem. Symlinks are
/// deliberately not followed: pins are keyed by the path the user typed,
/// the same way direnv keys `.envrc` files.
pub fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };

    let mut out = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
