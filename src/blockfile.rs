//! Managed text blocks inside user-owned files.
//!
//! A managed block is one delimited, machine-owned span of text living
//! inside an otherwise user-owned file (a `.envrc`, a shell RC file). This
//! module maintains exactly one instance of such a block without disturbing
//! unrelated content, ordering, or newline conventions outside the span.
//!
//! Marker matching is exact-literal, not pattern-based, and only the first
//! start/end occurrence is honored. The merge semantics are pure string
//! functions ([`merge`], [`strip`]); the file wrappers add I/O and Unix
//! permission handling.
//!
//! Shared-file caveat: these files are written whole by whichever terminal
//! session mutates them last. There is no locking protocol; concurrent
//! writes race at last-writer-wins granularity.

use crate::{Error, Result};
use std::fs;
use std::path::Path;

/// A literal start/end delimiter pair bounding a managed block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Markers {
    pub start: &'static str,
    pub end: &'static str,
}

impl Markers {
    pub const fn new(start: &'static str, end: &'static str) -> Self {
        Self { start, end }
    }

    /// Render a full block: start marker, body, end marker, one trailing
    /// newline.
    pub fn render(&self, body: &str) -> String {
        format!("{}\n{}\n{}\n", self.start, body, self.end)
    }
}

/// Where the managed span sits in a file, if anywhere.
#[derive(Debug, PartialEq, Eq)]
enum Span {
    /// Byte range covering start marker through end marker inclusive, plus
    /// one trailing newline if present.
    Found { start: usize, end: usize },
    /// Start marker present but no end marker after it. Recovered by
    /// appending a fresh block; the broken span is left untouched.
    Malformed,
    Absent,
}

fn find_span(content: &str, markers: &Markers) -> Span {
    let Some(start) = content.find(markers.start) else {
        return Span::Absent;
    };
    // The end marker must follow the start marker; an earlier stray end
    // marker does not close the span.
    match content[start..].find(markers.end) {
        Some(offset) => {
            let mut end = start + offset + markers.end.len();
            if content[end..].starts_with('\n') {
                end += 1;
            }
            Span::Found { start, end }
        }
        None => Span::Malformed,
    }
}

/// Merge a block with body `body` into `content`, returning the new file
/// content.
///
/// An existing well-formed span is replaced in place; everything before and
/// after is preserved byte-for-byte. A malformed span is left untouched and
/// a fresh block is appended at end-of-file. With no span, the block is
/// appended, separated by a newline only when the content is non-empty and
/// lacks a trailing one.
pub fn merge(content: &str, markers: &Markers, body: &str) -> String {
    let block = markers.render(body);
    match find_span(content, markers) {
        Span::Found { start, end } => {
            format!("{}{}{}", &content[..start], block, &content[end..])
        }
        Span::Malformed | Span::Absent => {
            let mut out = String::with_capacity(content.len() + block.len() + 1);
            out.push_str(content);
            if !content.is_empty() && !content.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&block);
            out
        }
    }
}

/// The outcome of stripping a managed block from file content.
#[derive(Debug, PartialEq, Eq)]
pub enum Removal {
    /// No well-formed span present; the file is left as-is.
    Untouched,
    /// Span deleted; rewrite the file with this content.
    Rewrite(String),
    /// Nothing but the span (and surrounding whitespace); delete the file.
    Delete,
}

/// Strip the managed span from `content`.
///
/// If the remainder, after trimming surrounding whitespace, is empty the
/// file should be deleted entirely; otherwise it is rewritten as the
/// trimmed remainder plus exactly one trailing newline.
pub fn strip(content: &str, markers: &Markers) -> Removal {
    match find_span(content, markers) {
        Span::Absent | Span::Malformed => Removal::Untouched,
        Span::Found { start, end } => {
            let remainder = format!("{}{}", &content[..start], &content[end..]);
            let trimmed = remainder.trim();
            if trimmed.is_empty() {
                Removal::Delete
            } else {
                Removal::Rewrite(format!("{trimmed}\n"))
            }
        }
    }
}

/// Upsert the managed block into the file at `path`.
///
/// A missing file is treated as empty. `mode` is applied when the file is
/// newly created; existing files keep their permissions (callers that must
/// enforce a mode on every write chmod separately).
pub fn upsert(path: &Path, markers: &Markers, body: &str, mode: u32) -> Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(Error::config_io("read", path, e)),
    };
    write_file(path, &merge(&existing, markers, body), mode)
}

/// Remove the managed block from the file at `path`.
///
/// No-op if the file or the block is absent. Deletes the file entirely when
/// nothing but the block (and whitespace) remains.
pub fn remove(path: &Path, markers: &Markers, mode: u32) -> Result<()> {
    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(Error::config_io("read", path, e)),
    };
    match strip(&existing, markers) {
        Removal::Untouched => Ok(()),
        Removal::Rewrite(content) => write_file(path, &content, mode),
        Removal::Delete => fs::remove_file(path).map_err(|e| Error::config_io("remove", path, e)),
    }
}

fn write_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    let existed = path.exists();
    fs::write(path, content).map_err(|e| Error::config_io("write", path, e))?;
    if !existed {
        set_mode(path, mode)?;
    }
    Ok(())
}

/// Apply a Unix permission mode to an existing file.
#[cfg(unix)]
pub fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| Error::config_io("set permissions on", path, e))
}

#[cfg(not(unix))]
pub fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
