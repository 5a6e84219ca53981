//! ghpin - per-directory GitHub credential contexts.
//!
//! This library provides the core functionality for the `ghpin` CLI tool:
//! a pin registry mapping directories to GitHub accounts, a managed-block
//! merger for `.envrc` and shell RC files, the direnv activation descriptor
//! generator, and the shell hook state machine that keeps per-command
//! token-injection wrappers in sync with the current directory.

pub mod action_log;
pub mod blockfile;
pub mod cli;
pub mod commands;
pub mod config;
pub mod direnv;
pub mod envrc;
pub mod ghauth;
pub mod hook;

use std::path::PathBuf;

/// Library-level error type for ghpin operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot {op} {}: {source}", .path.display())]
    ConfigIo {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse pin registry {}: {message}", .path.display())]
    ConfigParse { path: PathBuf, message: String },

    #[error("{0}")]
    CredentialProvider(String),

    #[error("{0}")]
    PrerequisiteMissing(String),

    #[error("no pin found for directory: {}", .0.display())]
    NotPinned(PathBuf),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a [`Error::ConfigIo`] naming the failed operation and path.
    pub fn config_io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ConfigIo {
            op,
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for ghpin operations.
pub type Result<T> = std::result::Result<T, Error>;
