#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use clap::error::ErrorKind;
use qadash::cli::app::{Cli, Command, RuntimeArgs};
use qadash::cli::commands::{self, CommandContext};
use qadash::config::{self, RuntimePaths};
use qadash::models::ResponseEnvelopeFailure;

const EXIT_SUCCESS: i32 = 0;
const EXIT_RUNTIME_FAILURE: i32 = 1;
const EXIT_USAGE_ERROR: i32 = 64;

fn main() {
    std::process::exit(run());
}

fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => return exit_code_for_parse_error(error),
    };
    if let Err(error) = qadash::telemetry::init_tracing() {
        eprintln!("qadash: logging disabled: {error:#}");
    }

    let command_name = cli.command.name();
    eprintln!("qadash: starting `{command_name}`");

    match execute(cli) {
        Ok(()) => {
            eprintln!("qadash: completed `{command_name}` (exit_code={EXIT_SUCCESS})");
            EXIT_SUCCESS
        }
        Err(error) => {
            let exit_code = EXIT_RUNTIME_FAILURE;
            eprintln!("qadash: failed `{command_name}` (exit_code={exit_code})");
            match error.downcast_ref::<ResponseEnvelopeFailure>() {
                Some(failure) => println!("{failure}"),
                None => eprintln!("{error:#}"),
            }
            exit_code
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    if let Command::Schema(args) = &cli.command {
        return commands::schema::run(args);
    }

    let context = CommandContext {
        paths: resolve_runtime_paths(&cli.runtime)?,
        policy: config::refresh_policy(cli.runtime.max_age_secs, cli.runtime.fetch_timeout_ms),
    };
    match &cli.command {
        Command::Kpis(args) => commands::kpis::run(args, &context),
        Command::Series(args) => commands::series::run(args, &context),
        Command::Breakdown(args) => commands::breakdown::run(args, &context),
        Command::Facets(args) => commands::facets::run(args, &context),
        Command::Export(args) => commands::export::run(args, &context),
        Command::Import(args) => commands::import::run(args, &context),
        Command::Schema(args) => commands::schema::run(args),
    }
}

fn exit_code_for_parse_error(error: clap::Error) -> i32 {
    let _ = error.print();
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => EXIT_SUCCESS,
        _ => EXIT_USAGE_ERROR,
    }
}

fn resolve_runtime_paths(args: &RuntimeArgs) -> Result<RuntimePaths> {
    let home_dir = std::env::var_os("HOME").map(PathBuf::from);
    let cwd = match &args.cwd {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };

    config::resolve_runtime_paths(
        home_dir.as_deref(),
        &cwd,
        args.data_dir.as_deref(),
        args.data_source.as_deref(),
    )
}
