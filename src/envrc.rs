//! Rendering pins into direnv activation blocks.
//!
//! A pinned directory's `.envrc` carries exactly one managed block invoking
//! one of two direnv entry points installed by `ghpin setup`:
//!
//! ```text
//! # ghpin:start
//! use_ghpin bob-work bob@co.com 'Bob Q. Worker' /home/bob/.ssh/id_work
//! # ghpin:end
//! ```
//!
//! The entry points take positional arguments, so an optional field may
//! only be rendered when every field before it is present.

use crate::blockfile::{self, Markers};
use crate::config::{Pin, PinMode};
use crate::Result;
use std::path::{Path, PathBuf};

/// Markers delimiting the activation block in a `.envrc`.
pub const ENVRC_MARKERS: Markers = Markers::new("# ghpin:start", "# ghpin:end");

/// direnv entry point for wrapper mode.
pub const ENTRY_WRAPPER: &str = "use_ghpin";

/// direnv entry point for export mode.
pub const ENTRY_EXPORT: &str = "use_ghpin_export";

/// `.envrc` files carry credential context; owner read/write only.
pub const ENVRC_FILE_MODE: u32 = 0o600;

/// Characters that never need shell quoting.
fn is_shell_safe(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/' | '@' | '+' | ':')
}

/// Quote a value for safe interpolation into the activation line.
///
/// A non-empty value made only of always-safe characters is emitted bare.
/// Anything else, including the empty string, is wrapped in single quotes
/// with each embedded single quote replaced by `'\''`, so the receiving
/// shell's word-splitting reconstructs the original value exactly.
pub fn shell_quote(s: &str) -> String {
    if !s.is_empty() && s.chars().all(is_shell_safe) {
        return s.to_string();
    }
    format!("'{}'", s.replace('\'', r"'\''"))
}

/// Render a pin into its one-line activation descriptor.
pub fn activation_line(pin: &Pin) -> String {
    let entry = match pin.effective_mode() {
        PinMode::Wrapper => ENTRY_WRAPPER,
        PinMode::Export => ENTRY_EXPORT,
    };

    let mut args = vec![shell_quote(&pin.user)];
    // Positional receiver: each later argument requires all earlier ones.
    if let Some(email) = &pin.git_email {
        args.push(shell_quote(email));
        if let Some(name) = &pin.git_name {
            args.push(shell_quote(name));
            if let Some(key) = &pin.ssh_key {
                args.push(shell_quote(&key.to_string_lossy()));
            }
        }
    }

    format!("{} {}", entry, args.join(" "))
}

/// Path of the `.envrc` managed for `dir`.
pub fn envrc_path(dir: &Path) -> PathBuf {
    dir.join(".envrc")
}

/// Create or update the activation block in the pin directory's `.envrc`,
/// preserving any surrounding user content. The file is forced to 0600 on
/// every write.
pub fn write_envrc(pin: &Pin) -> Result<()> {
    let path = envrc_path(&pin.dir);
    blockfile::upsert(&path, &ENVRC_MARKERS, &activation_line(pin), ENVRC_FILE_MODE)?;
    blockfile::set_mode(&path, ENVRC_FILE_MODE)
}

/// Remove the activation block from the directory's `.envrc`.
///
/// Deletes the file entirely when no user content remains.
pub fn remove_envrc(dir: &Path) -> Result<()> {
    blockfile::remove(&envrc_path(dir), &ENVRC_MARKERS, ENVRC_FILE_MODE)
}
