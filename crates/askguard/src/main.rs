#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use askguard::cli::app::{Cli, Command, RuntimeArgs};
use askguard::cli::commands;
use askguard::cli::{EXIT_RUNTIME_FAILURE, EXIT_SUCCESS, EXIT_USAGE_ERROR};
use askguard::config::RuntimePaths;
use askguard::models::{Envelope, EnvelopeFailure};
use askguard::utils::logging::init_logging;
use clap::Parser;
use clap::error::ErrorKind;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    init_logging();

    let command_name = cli.command.name();
    tracing::debug!(command = command_name, "starting");

    match execute(cli) {
        Ok(()) => {
            tracing::debug!(command = command_name, exit_code = EXIT_SUCCESS, "completed");
            EXIT_SUCCESS
        }
        Err(error) => {
            let (envelope, exit_code) = match error.downcast_ref::<EnvelopeFailure>() {
                Some(failure) => (failure.envelope().clone(), failure.exit_code()),
                None => (
                    Envelope::error(command_name, "runtime_failure", format!("{error:#}")),
                    EXIT_RUNTIME_FAILURE,
                ),
            };
            println!("{}", envelope.to_json_line());
            tracing::error!(command = command_name, exit_code, "{error:#}");
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Init(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::init::run(&args, &runtime_paths)
        }
        Command::Ask(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::ask::run(&args, &runtime_paths)
        }
        Command::Guard(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::guard::run(&args, &runtime_paths)
        }
        Command::Schema(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::schema::run(&args, &runtime_paths)
        }
        Command::Health(args) => {
            let runtime_paths = resolve_runtime_paths(&cli.runtime)?;
            commands::health::run(&args, &runtime_paths)
        }
        Command::Contract(args) => commands::contract::run(&args),
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = error.print();
            EXIT_SUCCESS
        }
        _ => {
            let _ = error.print();
            EXIT_USAGE_ERROR
        }
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = match &args.home_dir {
        Some(path) => path.clone(),
        None => std::env::var_os("HOME")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("HOME is not set; pass --home-dir"))?,
    };

    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    askguard::config::resolve_runtime_paths(&home_dir, &cwd, args.db.as_deref())
}
