//! The shell activation state machine.
//!
//! Runs once per interactive prompt render, driven by the installed shell
//! hook: `eval "$(ghpin hook eval)"`. Each cycle samples two environment
//! signals - the `GHPIN_USER` marker written by the direnv block and the
//! presence of `GH_TOKEN` - and reconciles the `gh()`/`git()` wrapper
//! functions against them:
//!
//! - marker present, token absent (wrapper mode): define the wrappers
//! - marker present, token present (export mode): remove the wrappers; the
//!   token already lives in the environment and a wrapper would shadow the
//!   real command for no benefit
//! - marker absent: remove the wrappers
//!
//! The previous cycle's signal pair is memoized in the shell variable
//! `GHPIN_HOOK_STATE`, so an unchanged prompt cycle emits nothing and costs
//! no credential-provider query. The transition itself is a pure function;
//! environment reads are confined to [`Signals::observe`] and the drivers.

use crate::envrc::shell_quote;
use crate::{ghauth, Error, Result};
use std::process::Command;

/// Marker variable exported by the direnv activation block.
pub const MARKER_ENV: &str = "GHPIN_USER";

/// Token variable; presence distinguishes export mode from wrapper mode.
pub const TOKEN_ENV: &str = "GH_TOKEN";

/// Companion token variable injected alongside [`TOKEN_ENV`].
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Shell variable holding the memoized signal pair between prompt cycles.
pub const MEMO_ENV: &str = "GHPIN_HOOK_STATE";

/// Commands intercepted by wrapper-mode bindings.
pub const WRAPPED_COMMANDS: [&str; 2] = ["gh", "git"];

/// The signal pair observed fresh each prompt cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signals {
    /// Account id carried by the marker variable, if the marker is present.
    pub account: Option<String>,
    /// Whether a token already sits in the shell environment.
    pub token_present: bool,
}

impl Signals {
    /// Sample the live environment.
    pub fn observe() -> Self {
        let account = std::env::var(MARKER_ENV).ok().filter(|v| !v.is_empty());
        let token_present = std::env::var(TOKEN_ENV).is_ok_and(|v| !v.is_empty());
        Self {
            account,
            token_present,
        }
    }

    /// The activation state this pair maps to.
    pub fn state(&self) -> HookState {
        match (&self.account, self.token_present) {
            (None, _) => HookState::Inactive,
            (Some(_), false) => HookState::WrapperActive,
            (Some(_), true) => HookState::ExportActive,
        }
    }

    /// Encode for the shell-held memo variable.
    pub fn encode(&self) -> String {
        let bit = if self.token_present { '1' } else { '0' };
        format!("{bit}:{}", self.account.as_deref().unwrap_or(""))
    }

    /// Decode a memo value; `None` for anything unrecognized, which makes
    /// the next cycle re-apply its transition (harmless - transitions are
    /// idempotent).
    pub fn decode(memo: &str) -> Option<Self> {
        let (bit, account) = memo.split_once(':')?;
        let token_present = match bit {
            "0" => false,
            "1" => true,
            _ => return None,
        };
        Some(Self {
            account: (!account.is_empty()).then(|| account.to_string()),
            token_present,
        })
    }
}

/// Activation states, keyed by the signal pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookState {
    /// Marker absent.
    Inactive,
    /// Marker present, token absent.
    WrapperActive,
    /// Marker present, token present.
    ExportActive,
}

/// The side effect one prompt cycle must apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingChange {
    /// (Re)define wrapper bindings for the marker's account.
    Define { account: String },
    /// Remove any existing wrapper bindings.
    Remove,
}

/// Pure transition function: memoized pair + fresh signals -> the binding
/// change to apply, or `None` when the pair is unchanged.
pub fn transition(prev: Option<&Signals>, current: &Signals) -> Option<BindingChange> {
    if prev == Some(current) {
        return None;
    }
    Some(match (current.state(), &current.account) {
        (HookState::WrapperActive, Some(account)) => BindingChange::Define {
            account: account.clone(),
        },
        _ => BindingChange::Remove,
    })
}

/// Render the shell code for one cycle: the wrapper-function changes (if
/// the pair changed) followed by the memo update. An unchanged pair renders
/// to the empty string.
pub fn render_cycle(prev: Option<&Signals>, current: &Signals) -> String {
    let Some(change) = transition(prev, current) else {
        return String::new();
    };

    let mut out = String::new();
    match change {
        BindingChange::Define { account } => {
            let quoted = shell_quote(&account);
            for cmd in WRAPPED_COMMANDS {
                out.push_str(&format!(
                    "{cmd}() {{ command ghpin hook run --account {quoted} {cmd} -- \"$@\"; }}\n"
                ));
            }
        }
        BindingChange::Remove => {
            out.push_str(&format!(
                "unset -f {} 2>/dev/null || true\n",
                WRAPPED_COMMANDS.join(" ")
            ));
        }
    }
    out.push_str(&format!(
        "export {}={}\n",
        MEMO_ENV,
        shell_quote(&current.encode())
    ));
    out
}

/// Run one prompt cycle against the live environment, returning the shell
/// code to eval.
pub fn eval_cycle() -> String {
    let prev = std::env::var(MEMO_ENV)
        .ok()
        .and_then(|memo| Signals::decode(&memo));
    render_cycle(prev.as_ref(), &Signals::observe())
}

/// Execute a wrapped command with the account's token injected only into
/// the spawned child's environment.
///
/// A failing or hung provider query degrades to running the command
/// unmodified with a warning on stderr - the user's command is never
/// aborted, and the query is retried naturally whenever the signals next
/// change. Returns the child's exit code.
pub fn run_wrapped(account: Option<&str>, program: &str, args: &[String]) -> Result<i32> {
    let account = account
        .map(str::to_string)
        .or_else(|| std::env::var(MARKER_ENV).ok().filter(|v| !v.is_empty()));

    let mut command = Command::new(program);
    command.args(args);

    if let Some(account) = &account {
        match ghauth::get_token_with_timeout(account, ghauth::PROMPT_TIMEOUT) {
            Ok(token) if !token.is_empty() => {
                command.env(TOKEN_ENV, &token).env(GITHUB_TOKEN_ENV, &token);
            }
            Ok(_) => {
                eprintln!(
                    "ghpin: warning: empty token for '{account}'; running {program} without injection"
                );
            }
            Err(e) => {
                eprintln!("ghpin: warning: {e}; running {program} without injection");
            }
        }
    }

    let status = command
        .status()
        .map_err(|e| Error::Other(format!("cannot run {program}: {e}")))?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signals(account: Option<&str>, token_present: bool) -> Signals {
        Signals {
            account: account.map(str::to_string),
            token_present,
        }
    }

    #[test]
    fn test_state_mapping() {
        assert_eq!(signals(None, false).state(), HookState::Inactive);
        assert_eq!(signals(None, true).state(), HookState::Inactive);
        assert_eq!(signals(Some("a"), false).state(), HookState::WrapperActive);
        assert_eq!(signals(Some("a"), true).state(), HookState::ExportActive);
    }

    #[test]
    fn test_identical_pair_is_noop() {
        let current = signals(Some("alice"), false);
        assert_eq!(transition(Some(&current.clone()), &current), None);
    }

    #[test]
    fn test_initial_cycle_with_no_memo_applies() {
        let current = signals(Some("alice"), false);
        assert_eq!(
            transition(None, &current),
            Some(BindingChange::Define {
                account: "alice".to_string()
            })
        );
    }

    #[test]
    fn test_account_change_redefines_bindings() {
        let prev = signals(Some("alice"), false);
        let current = signals(Some("bob"), false);
        assert_eq!(
            transition(Some(&prev), &current),
            Some(BindingChange::Define {
                account: "bob".to_string()
            })
        );
    }

    #[test]
    fn test_signal_sequence_produces_three_effective_transitions() {
        // (absent,false) -> (alice,false) -> (alice,false) -> (alice,true)
        // -> (absent,false): the first observation matches the initial
        // inactive state and the repeated pair is a no-op; bindings are
        // created on the second signal and removed on the fourth and fifth.
        let sequence = [
            signals(None, false),
            signals(Some("alice"), false),
            signals(Some("alice"), false),
            signals(Some("alice"), true),
            signals(None, false),
        ];

        // Initial state: inactive.
        let mut memo = signals(None, false);
        let mut changes = Vec::new();
        for current in &sequence {
            if let Some(change) = transition(Some(&memo), current) {
                changes.push(change);
            }
            memo = current.clone();
        }

        assert_eq!(
            changes,
            [
                BindingChange::Define {
                    account: "alice".to_string()
                },
                BindingChange::Remove,
                BindingChange::Remove,
            ]
        );
    }

    #[test]
    fn test_memo_round_trip() {
        for pair in [
            signals(None, false),
            signals(None, true),
            signals(Some("alice"), false),
            signals(Some("bob-work"), true),
        ] {
            assert_eq!(Signals::decode(&pair.encode()).as_ref(), Some(&pair));
        }
    }

    #[test]
    fn test_memo_decode_rejects_garbage() {
        assert_eq!(Signals::decode(""), None);
        assert_eq!(Signals::decode("alice"), None);
        assert_eq!(Signals::decode("2:alice"), None);
    }

    #[test]
    fn test_render_defines_wrappers() {
        let out = render_cycle(None, &signals(Some("alice"), false));
        assert!(out.contains("gh() { command ghpin hook run --account alice gh -- \"$@\"; }"));
        assert!(out.contains("git() { command ghpin hook run --account alice git -- \"$@\"; }"));
        assert!(out.contains("export GHPIN_HOOK_STATE=0:alice"));
    }

    #[test]
    fn test_render_removes_wrappers_in_export_state() {
        let prev = signals(Some("alice"), false);
        let out = render_cycle(Some(&prev), &signals(Some("alice"), true));
        assert!(out.contains("unset -f gh git"));
        assert!(!out.contains("hook run"));
        assert!(out.contains("export GHPIN_HOOK_STATE=1:alice"));
    }

    #[test]
    fn test_render_unchanged_pair_is_empty() {
        let current = signals(Some("alice"), false);
        assert_eq!(render_cycle(Some(&current.clone()), &current), "");
    }

    #[test]
    fn test_render_quotes_unsafe_account() {
        let out = render_cycle(None, &signals(Some("odd name"), false));
        assert!(out.contains("--account 'odd name'"));
    }
}
