//! Command implementations for the ghpin CLI.
//!
//! Each command loads what it needs, mutates through the registry/merger
//! layers, and prints one JSON object (default) or a human-readable
//! rendering (`-H`). Mutating operations abort and report on failure; the
//! hook plumbing in [`crate::hook`] never aborts the interactive session.

use crate::config::{Pin, PinMode, PinRegistry};
use crate::{blockfile, config, direnv, envrc, ghauth, hook, Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Print a report as pretty JSON, or through `render` under `-H`.
fn emit<T: Serialize>(report: &T, human: bool, render: impl FnOnce(&T) -> String) -> Result<()> {
    if human {
        println!("{}", render(report));
    } else {
        let json = serde_json::to_string_pretty(report)
            .map_err(|e| Error::Other(format!("cannot serialize output: {e}")))?;
        println!("{json}");
    }
    Ok(())
}

// ============================================================================
// pin
// ============================================================================

/// Arguments for [`pin`].
pub struct PinArgs {
    pub user: String,
    pub dir: PathBuf,
    pub git_email: Option<String>,
    pub git_name: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub export_token: bool,
    pub no_validate: bool,
}

#[derive(Serialize)]
struct PinReport {
    pinned: String,
    dir: PathBuf,
    mode: PinMode,
    envrc: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh_key: Option<PathBuf>,
    validated: bool,
    allowed: bool,
}

/// Pin a GitHub account to a directory.
pub fn pin(args: PinArgs, human: bool) -> Result<()> {
    let dir = config::absolute(&args.dir);

    let meta = std::fs::metadata(&dir)
        .map_err(|_| Error::Other(format!("directory does not exist: {}", dir.display())))?;
    if !meta.is_dir() {
        return Err(Error::Other(format!("not a directory: {}", dir.display())));
    }

    // Validation failure blocks the pin: a pin that cannot produce a token
    // would silently break every wrapped command in that directory.
    if !args.no_validate {
        ghauth::validate_user(&args.user)?;
    }

    let ssh_key = match args.ssh_key {
        Some(key) => {
            let key = config::absolute(&key);
            if !key.exists() {
                return Err(Error::Other(format!("SSH key not found: {}", key.display())));
            }
            Some(key)
        }
        None => None,
    };

    if !direnv::is_shell_lib_installed() {
        return Err(Error::PrerequisiteMissing(
            "direnv shell library not installed. Run first: ghpin setup".to_string(),
        ));
    }

    let mode = if args.export_token {
        PinMode::Export
    } else {
        PinMode::Wrapper
    };

    let pin = Pin {
        user: args.user.clone(),
        dir: dir.clone(),
        mode: Some(mode),
        git_email: args.git_email,
        git_name: args.git_name,
        ssh_key,
    };

    let mut registry = PinRegistry::load()?;
    registry.add(pin.clone());
    registry.save()?;

    envrc::write_envrc(&pin)?;

    let mut allowed = false;
    if direnv::is_installed() {
        match direnv::allow(&dir) {
            Ok(()) => allowed = true,
            Err(e) => {
                eprintln!("Warning: could not auto-allow .envrc: {e}");
                eprintln!("  Run manually: direnv allow {}/.envrc", dir.display());
            }
        }
    }

    let report = PinReport {
        pinned: pin.user,
        envrc: envrc::envrc_path(&dir),
        dir,
        mode,
        git_email: pin.git_email,
        git_name: pin.git_name,
        ssh_key: pin.ssh_key,
        validated: !args.no_validate,
        allowed,
    };
    emit(&report, human, |r| {
        let mut out = format!("Pinned '{}' -> {}\n", r.pinned, r.dir.display());
        out.push_str(&format!("  Mode:       {}\n", r.mode));
        if let Some(email) = &r.git_email {
            out.push_str(&format!("  Git email:  {email}\n"));
        }
        if let Some(name) = &r.git_name {
            out.push_str(&format!("  Git name:   {name}\n"));
        }
        if let Some(key) = &r.ssh_key {
            out.push_str(&format!("  SSH key:    {}\n", key.display()));
        }
        out.push_str(&format!("  .envrc:     {}\n", r.envrc.display()));
        match r.mode {
            PinMode::Wrapper => {
                out.push_str("\n  Token is injected per-command (never in shell environment).\n");
            }
            PinMode::Export => {
                out.push_str("\n  WARNING: Token is exported into the shell environment.\n");
                out.push_str("  All child processes can read GH_TOKEN/GITHUB_TOKEN.\n");
            }
        }
        out.push_str("\ncd into the directory to activate the profile.");
        out
    })
}

// ============================================================================
// unpin
// ============================================================================

#[derive(Serialize)]
struct UnpinReport {
    unpinned: String,
    dir: PathBuf,
}

/// Remove a pinned account from a directory.
pub fn unpin(directory: Option<PathBuf>, human: bool) -> Result<()> {
    let dir = config::absolute(&directory.unwrap_or_else(|| PathBuf::from(".")));

    let mut registry = PinRegistry::load()?;
    let user = registry
        .find(&dir)
        .map(|p| p.user.clone())
        .ok_or_else(|| Error::NotPinned(dir.clone()))?;

    registry.remove(&dir);
    registry.save()?;

    envrc::remove_envrc(&dir)?;

    let report = UnpinReport { unpinned: user, dir };
    emit(&report, human, |r| {
        format!("Unpinned '{}' from {}", r.unpinned, r.dir.display())
    })
}

// ============================================================================
// list
// ============================================================================

#[derive(Serialize)]
struct ListEntry {
    dir: PathBuf,
    user: String,
    mode: PinMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh_key: Option<PathBuf>,
    current: bool,
}

#[derive(Serialize)]
struct ListReport {
    pins: Vec<ListEntry>,
    total: usize,
}

/// List all pinned directories in insertion order.
pub fn list(human: bool) -> Result<()> {
    let registry = PinRegistry::load()?;
    let cwd = std::env::current_dir().unwrap_or_default();

    let pins: Vec<ListEntry> = registry
        .pins
        .iter()
        .map(|p| ListEntry {
            dir: p.dir.clone(),
            user: p.user.clone(),
            mode: p.effective_mode(),
            git_email: p.git_email.clone(),
            git_name: p.git_name.clone(),
            ssh_key: p.ssh_key.clone(),
            current: p.dir == cwd,
        })
        .collect();

    let report = ListReport {
        total: pins.len(),
        pins,
    };
    emit(&report, human, |r| {
        if r.pins.is_empty() {
            return "No pinned directories.\nPin one with: ghpin pin <username> --dir <path>"
                .to_string();
        }

        let mut rows: Vec<[String; 5]> = vec![[
            "DIRECTORY".to_string(),
            "ACCOUNT".to_string(),
            "MODE".to_string(),
            "GIT EMAIL".to_string(),
            "GIT NAME".to_string(),
        ]];
        for entry in &r.pins {
            let marker = if entry.current { "*" } else { " " };
            rows.push([
                format!("{} {}", marker, entry.dir.display()),
                entry.user.clone(),
                entry.mode.to_string(),
                entry.git_email.clone().unwrap_or_else(|| "-".to_string()),
                entry.git_name.clone().unwrap_or_else(|| "-".to_string()),
            ]);
        }

        let mut widths = [0usize; 5];
        for row in &rows {
            for (i, cell) in row.iter().enumerate() {
                widths[i] = widths[i].max(cell.len());
            }
        }

        let mut out = String::new();
        for row in &rows {
            let line: Vec<String> = row
                .iter()
                .enumerate()
                .map(|(i, cell)| format!("{cell:<width$}", width = widths[i]))
                .collect();
            out.push_str(line.join("  ").trim_end());
            out.push('\n');
        }
        out.push_str(&format!("\n{} pin(s) total. (* = current directory)", r.total));
        out
    })
}

// ============================================================================
// status
// ============================================================================

#[derive(Serialize)]
struct PinSummary {
    user: String,
    mode: PinMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ssh_key: Option<PathBuf>,
}

#[derive(Serialize)]
struct EnvironmentSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    gh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    github_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_author_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    git_ssh_command: Option<String>,
}

#[derive(Serialize)]
struct StatusReport {
    dir: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pin: Option<PinSummary>,
    environment: EnvironmentSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    active_user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    provider_error: Option<String>,
    diagnostics: Vec<String>,
}

/// Mask a token to its first and last four characters.
fn mask_token(token: &str) -> String {
    if token.len() <= 10 || !token.is_ascii() {
        return "****".to_string();
    }
    format!("{}****{}", &token[..4], &token[token.len() - 4..])
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Show the active profile context for the current directory.
pub fn status(human: bool) -> Result<()> {
    let dir = std::env::current_dir().map_err(|e| Error::Other(format!("cannot get current directory: {e}")))?;

    let registry = PinRegistry::load()?;
    let pin = registry.find(&dir).map(|p| PinSummary {
        user: p.user.clone(),
        mode: p.effective_mode(),
        git_email: p.git_email.clone(),
        git_name: p.git_name.clone(),
        ssh_key: p.ssh_key.clone(),
    });

    let gh_token = env_nonempty(hook::TOKEN_ENV);
    let environment = EnvironmentSummary {
        gh_token: gh_token.as_deref().map(mask_token),
        github_token: env_nonempty(hook::GITHUB_TOKEN_ENV).as_deref().map(mask_token),
        git_author_email: env_nonempty("GIT_AUTHOR_EMAIL"),
        git_author_name: env_nonempty("GIT_AUTHOR_NAME"),
        git_ssh_command: env_nonempty("GIT_SSH_COMMAND"),
    };

    let (active_user, provider_error) = match ghauth::list_users() {
        Ok(users) => (
            users
                .iter()
                .find(|u| u.active)
                .map(|u| format!("{} ({})", u.user, u.host)),
            None,
        ),
        Err(e) => (None, Some(e.to_string())),
    };

    let mut diagnostics = Vec::new();
    match (&pin, &gh_token) {
        (Some(p), None) if p.mode == PinMode::Export => {
            diagnostics.push(
                "directory is pinned in export mode but GH_TOKEN is not set; is direnv loaded? Try: cd ."
                    .to_string(),
            );
            if !direnv::is_installed() {
                diagnostics.push("direnv is not installed".to_string());
            } else if !direnv::is_shell_lib_installed() {
                diagnostics.push("shell library not installed; run: ghpin setup".to_string());
            } else if !direnv::check_direnv_hook() {
                diagnostics.push("direnv shell hook not detected in your shell config".to_string());
            }
        }
        (Some(p), None) if !direnv::is_shell_hook_installed() && p.mode == PinMode::Wrapper => {
            diagnostics
                .push("wrapper mode pin but the ghpin shell hook is not installed; run: ghpin setup".to_string());
        }
        (None, Some(_)) => {
            diagnostics.push(
                "GH_TOKEN is set but this directory has no pin; the token may come from another source"
                    .to_string(),
            );
        }
        _ => {}
    }

    let report = StatusReport {
        dir,
        pin,
        environment,
        active_user,
        provider_error,
        diagnostics,
    };
    emit(&report, human, |r| {
        let mut out = format!("Directory: {}\n\n", r.dir.display());
        match &r.pin {
            Some(p) => {
                out.push_str(&format!("  Pinned account:   {}\n", p.user));
                out.push_str(&format!("  Mode:             {}\n", p.mode));
                if let Some(email) = &p.git_email {
                    out.push_str(&format!("  Pinned email:     {email}\n"));
                }
                if let Some(name) = &p.git_name {
                    out.push_str(&format!("  Pinned name:      {name}\n"));
                }
                if let Some(key) = &p.ssh_key {
                    out.push_str(&format!("  Pinned SSH key:   {}\n", key.display()));
                }
            }
            None => out.push_str("  Pinned account:   (none)\n"),
        }

        out.push_str("\n  Environment:\n");
        let unset = "(not set)".to_string();
        out.push_str(&format!(
            "    GH_TOKEN:           {}\n",
            r.environment.gh_token.as_ref().unwrap_or(&unset)
        ));
        out.push_str(&format!(
            "    GITHUB_TOKEN:       {}\n",
            r.environment.github_token.as_ref().unwrap_or(&unset)
        ));
        out.push_str(&format!(
            "    GIT_AUTHOR_EMAIL:   {}\n",
            r.environment.git_author_email.as_ref().unwrap_or(&unset)
        ));
        out.push_str(&format!(
            "    GIT_AUTHOR_NAME:    {}\n",
            r.environment.git_author_name.as_ref().unwrap_or(&unset)
        ));
        if let Some(ssh) = &r.environment.git_ssh_command {
            out.push_str(&format!("    GIT_SSH_COMMAND:    {ssh}\n"));
        }

        out.push_str(&format!(
            "\n  Active gh user:   {}\n",
            r.active_user.as_deref().unwrap_or("(none active)")
        ));
        if let Some(e) = &r.provider_error {
            out.push_str(&format!("  (provider error: {e})\n"));
        }

        for diag in &r.diagnostics {
            out.push_str(&format!("\n  NOTE: {diag}"));
        }
        out.trim_end().to_string()
    })
}

// ============================================================================
// setup
// ============================================================================

#[derive(Serialize)]
struct AccountSummary {
    user: String,
    host: String,
    active: bool,
}

#[derive(Serialize, Default)]
struct MigrationReport {
    pins_updated: usize,
    envrc_rewritten: usize,
    allowed: usize,
    warnings: usize,
}

#[derive(Serialize)]
struct SetupReport {
    gh_version: String,
    direnv_version: String,
    direnv_hook_detected: bool,
    accounts: Vec<AccountSummary>,
    lib_path: PathBuf,
    hook_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    rc_path: Option<PathBuf>,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    migration: Option<MigrationReport>,
    ok: bool,
}

/// Install shell integration and validate prerequisites.
pub fn setup(migrate: bool, human: bool) -> Result<()> {
    let mut warnings = Vec::new();

    // Prerequisites are fatal for setup: there is nothing useful to install
    // without gh and direnv.
    let gh_version = ghauth::gh_version()?;
    if !ghauth::is_version_at_least(&gh_version, ghauth::MIN_GH_VERSION) {
        return Err(Error::PrerequisiteMissing(format!(
            "gh CLI v{}+ required for multi-account support (found v{gh_version})",
            ghauth::MIN_GH_VERSION
        )));
    }

    if !direnv::is_installed() {
        return Err(Error::PrerequisiteMissing(
            "direnv not found. Install it (apt/pacman/brew install direnv), then add the \
             shell hook: eval \"$(direnv hook bash|zsh)\""
                .to_string(),
        ));
    }
    let direnv_version = direnv::get_version().unwrap_or_default();

    let direnv_hook_detected = direnv::check_direnv_hook();
    if !direnv_hook_detected {
        warnings.push(
            "direnv hook not detected in your shell config; add: eval \"$(direnv hook <shell>)\""
                .to_string(),
        );
    }

    let accounts = match ghauth::list_users() {
        Ok(users) => users
            .into_iter()
            .map(|u| AccountSummary {
                user: u.user,
                host: u.host,
                active: u.active,
            })
            .collect(),
        Err(e) => {
            warnings.push(format!("cannot list gh accounts: {e}"));
            Vec::new()
        }
    };

    let lib_path = direnv::install_shell_lib()?;
    let hook_path = direnv::install_shell_hook()?;

    let rc_path = match direnv::detect_shell_rc() {
        Ok(rc) => {
            direnv::inject_hook_source(&rc, &hook_path)?;
            Some(rc)
        }
        Err(e) => {
            warnings.push(format!(
                "{e}; add manually to your shell RC: source \"{}\"",
                hook_path.display()
            ));
            None
        }
    };

    let migration = if migrate {
        let report = run_migration()?;
        if report.warnings > 0 {
            warnings.push(format!(
                "{} pin(s) could not be migrated (directories missing or not writable)",
                report.warnings
            ));
        }
        Some(report)
    } else {
        None
    };

    let report = SetupReport {
        gh_version,
        direnv_version,
        direnv_hook_detected,
        accounts,
        lib_path,
        hook_path,
        rc_path,
        ok: warnings.is_empty(),
        warnings,
        migration,
    };
    emit(&report, human, |r| {
        let mut out = String::from("ghpin setup\n===========\n\n");
        out.push_str(&format!("  gh CLI.............. v{}\n", r.gh_version));
        out.push_str(&format!("  direnv.............. v{}\n", r.direnv_version));
        out.push_str(&format!(
            "  direnv hook......... {}\n",
            if r.direnv_hook_detected { "OK" } else { "NOT DETECTED" }
        ));
        out.push_str(&format!("  gh accounts......... {}\n", r.accounts.len()));
        for account in &r.accounts {
            let marker = if account.active { "* " } else { "  " };
            out.push_str(&format!("    {}{} ({})\n", marker, account.user, account.host));
        }
        out.push_str(&format!("  direnv lib.......... {}\n", r.lib_path.display()));
        out.push_str(&format!("  shell hook.......... {}\n", r.hook_path.display()));
        match &r.rc_path {
            Some(rc) => out.push_str(&format!("  shell RC............ {}\n", rc.display())),
            None => out.push_str("  shell RC............ SKIPPED\n"),
        }
        if let Some(m) = &r.migration {
            out.push_str(&format!(
                "  migration........... pins updated: {}, .envrc rewritten: {}, allowed: {}\n",
                m.pins_updated, m.envrc_rewritten, m.allowed
            ));
        }
        for warning in &r.warnings {
            out.push_str(&format!("\n  WARNING: {warning}"));
        }
        if r.ok {
            out.push_str("\n  Setup complete! Pin accounts to directories with:\n");
            out.push_str("    ghpin pin <username> --dir <path>\n");
            out.push_str("\n  Restart your shell to activate the hook.");
        } else {
            out.push_str("\n\n  Setup complete with warnings (see above).");
        }
        out
    })
}

/// Refresh generated files, repair permissions, and normalize pin modes.
fn run_migration() -> Result<MigrationReport> {
    let mut report = MigrationReport::default();

    let mut registry = PinRegistry::load()?;

    // Permission repair is best-effort; missing files are not a migration
    // failure.
    if let Ok(dir) = config::config_dir() {
        if dir.exists() {
            let _ = blockfile::set_mode(&dir, config::CONFIG_DIR_MODE);
        }
    }
    if let Ok(path) = config::pins_file_path() {
        if path.exists() {
            let _ = blockfile::set_mode(&path, config::REGISTRY_FILE_MODE);
        }
    }

    for pin in &mut registry.pins {
        if pin.mode.is_none() {
            pin.mode = Some(PinMode::Wrapper);
            report.pins_updated += 1;
        }
    }
    if report.pins_updated > 0 {
        registry.save()?;
    }

    for pin in &registry.pins {
        if !pin.dir.exists() {
            report.warnings += 1;
            continue;
        }
        if envrc::write_envrc(pin).is_err() {
            report.warnings += 1;
            continue;
        }
        report.envrc_rewritten += 1;

        if direnv::is_installed() {
            match direnv::allow(&pin.dir) {
                Ok(()) => report.allowed += 1,
                Err(_) => report.warnings += 1,
            }
        }
    }

    Ok(report)
}

// ============================================================================
// doctor
// ============================================================================

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

#[derive(Serialize)]
struct DoctorReport {
    checks: Vec<DoctorCheck>,
    issues: usize,
}

fn check(name: &str, ok: bool, detail: Option<String>) -> DoctorCheck {
    DoctorCheck {
        name: name.to_string(),
        ok,
        detail,
    }
}

/// Validate shell integration, pin schema, and managed `.envrc`
/// permissions.
pub fn doctor(fix: bool, human: bool) -> Result<()> {
    if fix {
        return setup(true, human);
    }

    let registry = PinRegistry::load()?;

    let missing_modes = registry.pins.iter().filter(|p| p.mode.is_none()).count();
    let perm_issues = registry
        .pins
        .iter()
        .filter(|p| envrc_mode_issue(&p.dir))
        .count();

    let checks = vec![
        check("direnv library installed", direnv::is_shell_lib_installed(), None),
        check(
            "shell hook source configured",
            direnv::is_shell_hook_installed(),
            None,
        ),
        check(
            "pin modes normalized",
            missing_modes == 0,
            (missing_modes > 0).then(|| {
                format!("{missing_modes} pin(s) missing mode (will default to wrapper)")
            }),
        ),
        check(
            "managed .envrc permissions are 0600",
            perm_issues == 0,
            (perm_issues > 0).then(|| format!("{perm_issues} managed .envrc file(s) not 0600")),
        ),
    ];

    let issues = checks.iter().filter(|c| !c.ok).count();
    let report = DoctorReport { checks, issues };
    emit(&report, human, |r| {
        let mut out = String::from("ghpin doctor\n============\n");
        for c in &r.checks {
            let status = if c.ok { "OK  " } else { "WARN" };
            out.push_str(&format!("{status} {}", c.name));
            if let Some(detail) = &c.detail {
                out.push_str(&format!(" ({detail})"));
            }
            out.push('\n');
        }
        if r.issues == 0 {
            out.push_str("\nDoctor check passed.");
        } else {
            out.push_str("\nRun `ghpin setup --migrate` to fix detected issues.");
        }
        out
    })
}

#[cfg(unix)]
fn envrc_mode_issue(dir: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    match std::fs::metadata(envrc::envrc_path(dir)) {
        Ok(meta) => meta.permissions().mode() & 0o777 != envrc::ENVRC_FILE_MODE,
        Err(_) => false,
    }
}

#[cfg(not(unix))]
fn envrc_mode_issue(_dir: &Path) -> bool {
    false
}

// ============================================================================
// upgrade drift
// ============================================================================

/// One-line stderr nudge when generated files or the pin schema lag behind
/// the installed version. Runs before every command except setup, doctor,
/// and the hook plumbing; never blocks the command itself.
pub fn warn_upgrade_drift() {
    let Ok(registry) = PinRegistry::load() else {
        return;
    };
    if registry.pins.is_empty() {
        return;
    }

    let needs_setup = !direnv::is_shell_lib_installed() || !direnv::is_shell_hook_installed();
    let needs_mode_migration = registry.pins.iter().any(|p| p.mode.is_none());
    let needs_envrc_perms = registry.pins.iter().any(|p| envrc_mode_issue(&p.dir));

    if needs_setup || needs_mode_migration || needs_envrc_perms {
        eprintln!(
            "ghpin: upgrade tasks detected. Run `ghpin setup --migrate` to apply migrations."
        );
    }
}

// ============================================================================
// hook plumbing
// ============================================================================

/// Emit the shell code for one prompt cycle on stdout.
pub fn hook_eval() -> Result<()> {
    print!("{}", hook::eval_cycle());
    Ok(())
}

/// Run a wrapped command, returning its exit code.
pub fn hook_run(account: Option<&str>, command: &str, args: &[String]) -> Result<i32> {
    hook::run_wrapped(account, command, args)
}
