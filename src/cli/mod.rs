//! CLI argument definitions for ghpin.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Long version string carrying build metadata from build.rs.
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GHPIN_GIT_COMMIT"),
    " ",
    env!("GHPIN_BUILD_TIMESTAMP"),
    ")"
);

/// ghpin - automatic GitHub profile switching per directory.
///
/// Pin a GitHub account to a directory; when you cd in, direnv activates
/// the right credential context and git identity, no manual switching.
#[derive(Parser, Debug)]
#[command(name = "ghpin")]
#[command(author, version, long_version = LONG_VERSION)]
#[command(about = "Pin GitHub accounts to directories, activated by direnv", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Pin a GitHub account to a directory
    ///
    /// By default, tokens are injected per-command via shell wrapper
    /// functions (wrapper mode); the token never sits in your shell
    /// environment. Use --export-token for directories where third-party
    /// tools (Terraform, act, etc.) need GH_TOKEN / GITHUB_TOKEN.
    Pin {
        /// GitHub account to pin (as listed by `gh auth status`)
        user: String,

        /// Directory to pin (defaults to the current directory)
        #[arg(short, long, default_value = ".")]
        dir: PathBuf,

        /// Git author/committer email for this directory
        #[arg(long)]
        git_email: Option<String>,

        /// Git author/committer name for this directory
        #[arg(long, requires = "git_email")]
        git_name: Option<String>,

        /// Path to SSH private key for this directory
        #[arg(long, requires = "git_name")]
        ssh_key: Option<PathBuf>,

        /// Export GH_TOKEN/GITHUB_TOKEN into the shell environment (less secure)
        #[arg(long)]
        export_token: bool,

        /// Skip validating the account against the gh CLI
        #[arg(long)]
        no_validate: bool,
    },

    /// Remove a pinned account from a directory
    ///
    /// Removes the ghpin block from the directory's .envrc and deletes the
    /// pin from the registry. If the .envrc has no other content, it is
    /// deleted entirely.
    Unpin {
        /// Directory to unpin (defaults to the current directory)
        directory: Option<PathBuf>,
    },

    /// List all pinned directories
    #[command(alias = "ls")]
    List,

    /// Show the active profile context for the current directory
    Status,

    /// Install the direnv library and shell hook, validate prerequisites
    ///
    /// Run this once after installing ghpin. Use --migrate after upgrading
    /// to refresh generated files, repair permissions, and update existing
    /// pins to the latest defaults.
    Setup {
        /// Migrate existing pins and rewrite managed .envrc files
        #[arg(long)]
        migrate: bool,
    },

    /// Check setup and migration health
    Doctor {
        /// Run setup migration automatically
        #[arg(long)]
        fix: bool,
    },

    /// Shell plumbing invoked by the installed hook (not for direct use)
    #[command(hide = true)]
    Hook {
        #[command(subcommand)]
        command: HookCommands,
    },
}

/// Prompt-cycle plumbing commands
#[derive(Subcommand, Debug)]
pub enum HookCommands {
    /// Emit shell code reconciling wrapper bindings with the live signals
    Eval,

    /// Run a wrapped command with per-invocation token injection
    Run {
        /// Account to fetch the token for (defaults to $GHPIN_USER)
        #[arg(long)]
        account: Option<String>,

        /// Command to execute
        command: String,

        /// Arguments passed through to the command
        #[arg(last = true)]
        args: Vec<String>,
    },
}
