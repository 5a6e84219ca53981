//! The pin registry: a persisted directory-to-account mapping.
//!
//! The registry is one TOML file holding an insertion-ordered `[[pins]]`
//! array. Every mutation rewrites the whole file as a single atomic
//! replace; there are no partial updates and no record-level locking.

use crate::blockfile::set_mode;
use crate::config::{self, CONFIG_DIR_MODE, REGISTRY_FILE_MODE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// PinMode controls how tokens are injected into the shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinMode {
    /// Wrapper (default) - direnv exports only the `GHPIN_USER` marker; the
    /// shell hook creates `gh()`/`git()` wrapper functions that inject the
    /// token per invocation. The token never sits in the shell environment.
    #[default]
    Wrapper,

    /// Export - direnv exports `GH_TOKEN` and `GITHUB_TOKEN` directly into
    /// the shell environment. Use for directories where third-party tools
    /// (Terraform, act, etc.) need the env var.
    Export,
}

impl PinMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PinMode::Wrapper => "wrapper",
            PinMode::Export => "export",
        }
    }
}

impl std::fmt::Display for PinMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A directory-to-account mapping.
///
/// `dir` is stored in lexically absolute form and uniquely keys at most one
/// pin. A repeat pin on the same directory fully replaces the prior record:
/// omitted optional fields are cleared, not preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pin {
    /// GitHub account, as listed by `gh auth status`.
    pub user: String,

    /// Canonical absolute directory path (the unique key).
    pub dir: PathBuf,

    /// Token injection mode; absent in legacy registries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<PinMode>,

    /// Git author/committer email for this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_email: Option<String>,

    /// Git author/committer name for this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_name: Option<String>,

    /// SSH private key used for git operations in this directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<PathBuf>,
}

impl Pin {
    /// The pin's mode, defaulting to [`PinMode::Wrapper`].
    pub fn effective_mode(&self) -> PinMode {
        self.mode.unwrap_or_default()
    }
}

/// All directory pins, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PinRegistry {
    #[serde(default)]
    pub pins: Vec<Pin>,
}

impl PinRegistry {
    /// Read the pin registry from its default location.
    ///
    /// A missing backing store yields an empty registry, not an error.
    pub fn load() -> Result<Self> {
        Self::load_from(&config::pins_file_path()?)
    }

    /// Read the pin registry from `path`.
    pub fn load_from(path: &Path) -> Result<Self> {
        let data = match fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default());
            }
            Err(e) => return Err(Error::config_io("read pins file", path, e)),
        };

        toml::from_str(&data).map_err(|e| Error::ConfigParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Write the pin registry to its default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config::pins_file_path()?)
    }

    /// Write the pin registry to `path` as a single atomic replace.
    ///
    /// Creates the parent directory (0700) if absent; the file itself is
    /// written 0600 because it names accounts and key paths.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        let dir = path.parent().unwrap_or(Path::new("."));
        fs::create_dir_all(dir).map_err(|e| Error::config_io("create config directory", dir, e))?;
        set_mode(dir, CONFIG_DIR_MODE)?;

        let data = toml::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("cannot serialize pins: {e}")))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .map_err(|e| Error::config_io("create temp file in", dir, e))?;
        tmp.write_all(data.as_bytes())
            .map_err(|e| Error::config_io("write pins file", path, e))?;
        set_mode(tmp.path(), REGISTRY_FILE_MODE)?;
        tmp.persist(path)
            .map_err(|e| Error::config_io("replace pins file", path, e.error))?;
        Ok(())
    }

    /// The pin whose stored directory exactly equals `dir`, or `None`.
    ///
    /// No ancestor or descendant matching: a path three levels under a
    /// pinned directory is not matched, nor is the pinned directory's
    /// parent.
    pub fn find(&self, dir: &Path) -> Option<&Pin> {
        let abs = config::absolute(dir);
        self.pins.iter().find(|p| p.dir == abs)
    }

    /// Add or update a pin.
    ///
    /// Replaces the existing entry in place if the directory matches
    /// (full-field overwrite), else appends, preserving insertion order.
    pub fn add(&mut self, mut pin: Pin) {
        pin.dir = config::absolute(&pin.dir);
        if let Some(existing) = self.pins.iter_mut().find(|p| p.dir == pin.dir) {
            *existing = pin;
        } else {
            self.pins.push(pin);
        }
    }

    /// Remove a pin by directory path. Returns true if found and removed.
    pub fn remove(&mut self, dir: &Path) -> bool {
        let abs = config::absolute(dir);
        let before = self.pins.len();
        self.pins.retain(|p| p.dir != abs);
        self.pins.len() != before
    }
}
