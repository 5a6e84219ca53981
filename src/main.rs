//! ghpin CLI - automatic GitHub profile switching per directory.

use clap::Parser;
use ghpin::cli::{Cli, Commands, HookCommands};
use ghpin::{action_log, commands};
use std::process;
use std::time::Instant;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    match cli.command {
        // Hook cycles fire on every prompt render: dispatch them directly,
        // without drift warnings or action logging.
        Commands::Hook { command } => run_hook(command),
        command => run(command, human),
    }
}

fn run_hook(command: HookCommands) {
    match command {
        HookCommands::Eval => {
            // The emitted code is eval'd by the shell; an error here must
            // never break the interactive session.
            let _ = commands::hook_eval();
        }
        HookCommands::Run {
            account,
            command,
            args,
        } => match commands::hook_run(account.as_deref(), &command, &args) {
            Ok(code) => process::exit(code),
            Err(e) => {
                eprintln!("ghpin: {e}");
                process::exit(127);
            }
        },
    }
}

fn run(command: Commands, human: bool) {
    if !matches!(command, Commands::Setup { .. } | Commands::Doctor { .. }) {
        commands::warn_upgrade_drift();
    }

    let (cmd_name, args_json) = describe_command(&command);
    let start = Instant::now();

    let result = run_command(command, human);

    let duration = start.elapsed().as_millis() as u64;
    let (success, error) = match &result {
        Ok(()) => (true, None),
        Err(e) => (false, Some(e.to_string())),
    };
    action_log::log_action(&cmd_name, args_json, success, error, duration);

    if let Err(e) = result {
        if human {
            eprintln!("Error: {e}");
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn run_command(command: Commands, human: bool) -> ghpin::Result<()> {
    match command {
        Commands::Pin {
            user,
            dir,
            git_email,
            git_name,
            ssh_key,
            export_token,
            no_validate,
        } => commands::pin(
            commands::PinArgs {
                user,
                dir,
                git_email,
                git_name,
                ssh_key,
                export_token,
                no_validate,
            },
            human,
        ),
        Commands::Unpin { directory } => commands::unpin(directory, human),
        Commands::List => commands::list(human),
        Commands::Status => commands::status(human),
        Commands::Setup { migrate } => commands::setup(migrate, human),
        Commands::Doctor { fix } => commands::doctor(fix, human),
        Commands::Hook { .. } => unreachable!("hook commands dispatched in main"),
    }
}

/// Serialize the command for the action log.
fn describe_command(command: &Commands) -> (String, serde_json::Value) {
    match command {
        Commands::Pin {
            user,
            dir,
            git_email,
            git_name,
            ssh_key,
            export_token,
            no_validate,
        } => (
            "pin".to_string(),
            serde_json::json!({
                "user": user,
                "dir": dir,
                "git_email": git_email,
                "git_name": git_name,
                "ssh_key": ssh_key,
                "export_token": export_token,
                "no_validate": no_validate,
            }),
        ),
        Commands::Unpin { directory } => (
            "unpin".to_string(),
            serde_json::json!({ "directory": directory }),
        ),
        Commands::List => ("list".to_string(), serde_json::json!({})),
        Commands::Status => ("status".to_string(), serde_json::json!({})),
        Commands::Setup { migrate } => (
            "setup".to_string(),
            serde_json::json!({ "migrate": migrate }),
        ),
        Commands::Doctor { fix } => ("doctor".to_string(), serde_json::json!({ "fix": fix })),
        Commands::Hook { .. } => ("hook".to_string(), serde_json::json!({})),
    }
}
