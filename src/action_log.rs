//! Action logging for ghpin commands.
//!
//! Every CLI invocation (except the per-prompt `hook` cycles, which fire on
//! each prompt render) appends one JSONL entry to
//! `~/.local/share/ghpin/action.log`. Logging never fails a command; errors
//! degrade to a stderr warning. Set `GHPIN_ACTION_LOG=0` to disable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

/// Environment variable toggling the action log.
pub const ACTION_LOG_ENV: &str = "GHPIN_ACTION_LOG";

/// A single action log entry.
#[derive(Debug, Serialize, Deserialize)]
pub struct ActionLog {
    /// ISO 8601 timestamp when the action occurred
    pub timestamp: DateTime<Utc>,

    /// Directory the command was executed from
    pub cwd: String,

    /// Command name (e.g., "pin", "unpin", "setup")
    pub command: String,

    /// Command arguments as JSON, with sensitive values redacted
    pub args: serde_json::Value,

    /// Whether the command succeeded
    pub success: bool,

    /// Error message if the command failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Command execution duration in milliseconds
    pub duration_ms: u64,

    /// User who executed the command
    pub user: String,
}

/// Log an action. Silently skips when disabled; warns instead of failing
/// when the log file cannot be written.
pub fn log_action(
    command: &str,
    args: serde_json::Value,
    success: bool,
    error: Option<String>,
    duration_ms: u64,
) {
    if !enabled() {
        return;
    }

    let Some(log_path) = log_path() else {
        return;
    };

    let entry = ActionLog {
        timestamp: Utc::now(),
        cwd: std::env::current_dir()
            .map(|d| d.to_string_lossy().into_owned())
            .unwrap_or_default(),
        command: command.to_string(),
        args: sanitize_args(&args),
        success,
        error,
        duration_ms,
        user: current_user(),
    };

    if let Err(e) = append_entry(&log_path, &entry) {
        eprintln!("Warning: failed to write action log: {e}");
    }
}

fn enabled() -> bool {
    match std::env::var(ACTION_LOG_ENV) {
        Ok(value) => !matches!(value.to_lowercase().as_str(), "0" | "false" | "no"),
        Err(_) => true,
    }
}

/// `$XDG_DATA_HOME/ghpin/action.log`, defaulting to
/// `~/.local/share/ghpin/action.log`.
fn log_path() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_DATA_HOME") {
        if !dir.is_empty() {
            return Some(PathBuf::from(dir).join("ghpin").join("action.log"));
        }
    }
    Some(dirs::home_dir()?.join(".local/share/ghpin/action.log"))
}

fn append_entry(path: &PathBuf, entry: &ActionLog) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string(entry)?;
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{json}")?;
    Ok(())
}

/// Redact values under token-ish keys and truncate oversized strings.
fn sanitize_args(args: &serde_json::Value) -> serde_json::Value {
    match args {
        serde_json::Value::Object(map) => {
            let mut sanitized = serde_json::Map::new();
            for (key, value) in map {
                let key_lower = key.to_lowercase();
                if key_lower.contains("token")
                    || key_lower.contains("secret")
                    || key_lower.contains("password")
                {
                    sanitized.insert(
                        key.clone(),
                        serde_json::Value::String("[REDACTED]".to_string()),
                    );
                } else {
                    sanitized.insert(key.clone(), sanitize_args(value));
                }
            }
            serde_json::Value::Object(sanitized)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.iter().map(sanitize_args).collect())
        }
        serde_json::Value::String(s) if s.len() > 200 => {
            serde_json::Value::String(format!("{}... ({} chars)", &s[..197], s.len()))
        }
        _ => args.clone(),
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_redacts_token_keys() {
        let value = serde_json::json!({
            "user": "alice",
            "gh_token": "ghp_abc123",
            "dir": "/work/repo"
        });
        let sanitized = sanitize_args(&value);

        assert_eq!(sanitized["user"], "alice");
        assert_eq!(sanitized["gh_token"], "[REDACTED]");
        assert_eq!(sanitized["dir"], "/work/repo");
    }

    #[test]
    fn test_sanitize_recurses_into_nested_values() {
        let value = serde_json::json!({
            "outer": { "api_secret": "x" },
            "list": [{ "password": "y" }]
        });
        let sanitized = sanitize_args(&value);

        assert_eq!(sanitized["outer"]["api_secret"], "[REDACTED]");
        assert_eq!(sanitized["list"][0]["password"], "[REDACTED]");
    }

    #[test]
    fn test_sanitize_truncates_long_strings() {
        let long = "a".repeat(300);
        let sanitized = sanitize_args(&serde_json::json!(long));
        let serde_json::Value::String(s) = sanitized else {
            panic!("expected string");
        };
        assert!(s.ends_with("(300 chars)"));
        assert!(s.len() < 300);
    }

    #[test]
    fn test_sanitize_leaves_short_values_alone() {
        let value = serde_json::json!({ "dir": "/a", "n": 3, "flag": true });
        assert_eq!(sanitize_args(&value), value);
    }
}
