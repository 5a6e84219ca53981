//! gh CLI interactions: token retrieval and account discovery.
//!
//! Every call shells out to `gh` with a bounded wait so a hung keyring or
//! network prompt can never stall the caller, in particular the
//! interactive-prompt wrapper path, which runs on a tighter bound.

use crate::{Error, Result};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Timeout for explicit gh queries (validation, listing).
pub const GH_TIMEOUT: Duration = Duration::from_secs(10);

/// Tighter timeout for queries fired from the per-prompt wrapper path.
pub const PROMPT_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum gh version with multi-account support.
pub const MIN_GH_VERSION: &str = "2.40.0";

/// A logged-in GitHub account as reported by `gh auth status`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub user: String,
    pub host: String,
    pub active: bool,
    pub protocol: String,
}

/// Run gh with the given arguments, killing it after `timeout`.
fn run_gh(args: &[&str], timeout: Duration) -> Result<Output> {
    let mut child = Command::new("gh")
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            Error::CredentialProvider(format!(
                "cannot run gh: {e} (is the GitHub CLI installed?)"
            ))
        })?;

    match child
        .wait_timeout(timeout)
        .map_err(|e| Error::CredentialProvider(format!("cannot wait for gh: {e}")))?
    {
        Some(_) => child
            .wait_with_output()
            .map_err(|e| Error::CredentialProvider(format!("cannot read gh output: {e}"))),
        None => {
            let _ = child.kill();
            let _ = child.wait();
            Err(Error::CredentialProvider(format!(
                "gh {} timed out after {}s",
                args.join(" "),
                timeout.as_secs()
            )))
        }
    }
}

/// Retrieve the OAuth token for a specific gh user from the keyring without
/// changing the active account.
pub fn get_token(user: &str) -> Result<String> {
    get_token_with_timeout(user, GH_TIMEOUT)
}

/// [`get_token`] with an explicit timeout (the prompt path passes
/// [`PROMPT_TIMEOUT`]).
pub fn get_token_with_timeout(user: &str, timeout: Duration) -> Result<String> {
    let output = run_gh(&["auth", "token", "--user", user], timeout)?;
    if !output.status.success() {
        return Err(Error::CredentialProvider(format!(
            "cannot get token for user '{user}': {} (is the user logged in via 'gh auth login'?)",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Check that a gh user is authenticated and a token can be retrieved.
pub fn validate_user(user: &str) -> Result<()> {
    let token = get_token(user).map_err(|e| {
        Error::CredentialProvider(format!(
            "user '{user}' is not authenticated with gh CLI: {e}\nRun: gh auth login"
        ))
    })?;
    if token.is_empty() {
        return Err(Error::CredentialProvider(format!(
            "user '{user}' returned an empty token - re-authenticate with: gh auth login"
        )));
    }
    Ok(())
}

/// List all logged-in accounts by parsing `gh auth status`.
pub fn list_users() -> Result<Vec<UserInfo>> {
    let output = run_gh(&["auth", "status"], GH_TIMEOUT)?;

    // gh auth status exits non-zero when there are inactive accounts but
    // still prints the full listing, and historically reports on stderr;
    // parse the combined text whenever it looks like a status report.
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() && !text.contains("Logged in") {
        return Err(Error::CredentialProvider(format!(
            "cannot get auth status: {}",
            text.trim()
        )));
    }
    Ok(parse_auth_status(&text))
}

/// The gh CLI version string (e.g., "2.86.0").
pub fn gh_version() -> Result<String> {
    let output = run_gh(&["--version"], GH_TIMEOUT)
        .map_err(|e| Error::PrerequisiteMissing(format!("gh CLI not found: {e}")))?;

    // Output: "gh version 2.86.0 (2025-02-18)\n..."
    let stdout = String::from_utf8_lossy(&output.stdout);
    let first = stdout
        .lines()
        .next()
        .ok_or_else(|| Error::PrerequisiteMissing("unexpected gh --version output".to_string()))?;
    let fields: Vec<&str> = first.split_whitespace().collect();
    if fields.len() >= 3 {
        Ok(fields[2].to_string())
    } else {
        Ok(first.to_string())
    }
}

/// Lenient major.minor.patch comparison; missing parts count as zero.
pub fn is_version_at_least(current: &str, minimum: &str) -> bool {
    let parse = |s: &str| -> Vec<u64> {
        s.split('.')
            .map(|part| {
                part.chars()
                    .take_while(|c| c.is_ascii_digit())
                    .collect::<String>()
                    .parse()
                    .unwrap_or(0)
            })
            .collect()
    };
    let cur = parse(current);
    let min = parse(minimum);

    for i in 0..3 {
        let c = cur.get(i).copied().unwrap_or(0);
        let m = min.get(i).copied().unwrap_or(0);
        if c != m {
            return c > m;
        }
    }
    true
}

/// Parse `gh auth status` output with a line-oriented grammar:
///
/// ```text
/// github.com                                     <- host header
///   ✓ Logged in to github.com account alice (keyring)
///   - Active account: true                       <- indented attributes
///   - Git operations protocol: https
/// ```
fn parse_auth_status(output: &str) -> Vec<UserInfo> {
    let lines: Vec<&str> = output.lines().collect();
    let mut users = Vec::new();
    let mut current_host = String::new();

    for (i, line) in lines.iter().enumerate() {
        if let Some(host) = parse_host_header(line) {
            current_host = host.to_string();
            continue;
        }

        let Some(user) = parse_account_line(line.trim()) else {
            continue;
        };

        // Attribute lines sit indented under the account line; stop the
        // look-ahead at the next account or host.
        let mut active = false;
        let mut protocol = "https".to_string();
        for next in lines.iter().skip(i + 1).take(4) {
            let next = next.trim();
            if next.contains("Logged in to") || parse_host_header(next).is_some() {
                break;
            }
            if next.contains("Active account: true") {
                active = true;
            }
            if next.contains("Git operations protocol:") {
                if let Some((_, value)) = next.split_once(':') {
                    protocol = value.trim().to_string();
                }
            }
        }

        users.push(UserInfo {
            user,
            host: current_host.clone(),
            active,
            protocol,
        });
    }
    users
}

/// A host header is an un-indented line containing a dot and no spaces
/// (e.g., "github.com", "ghe.example.net").
fn parse_host_header(line: &str) -> Option<&str> {
    if line.starts_with(' ') || line.starts_with('\t') {
        return None;
    }
    let trimmed = line.trim();
    if !trimmed.is_empty() && trimmed.contains('.') && !trimmed.contains(' ') {
        Some(trimmed)
    } else {
        None
    }
}

/// Extract the username from an account line:
/// `✓ Logged in to github.com account alice (keyring)`.
fn parse_account_line(line: &str) -> Option<String> {
    if !line.contains("Logged in to") {
        return None;
    }
    let rest = line.split_once("account ")?.1;
    let user = match rest.split_once(" (") {
        Some((user, _)) => user,
        None => rest,
    };
    if user.is_empty() {
        None
    } else {
        Some(user.to_string())
    }
}
