use clap::Parser;
use std::process::ExitCode;

use dull_cli::{cli, commands, error, logging};

fn main() -> ExitCode {
    let _ = enable_ansi_support::enable_ansi_support();
    let args = cli::Cli::parse();

    match &args.command {
        cli::Command::Version => {
            commands::version::run();
            return ExitCode::SUCCESS;
        }
        cli::Command::Completions(opts) => {
            commands::completions::run(opts);
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let name = args.command.name();
    logging::init_subscriber(args.verbose, name);
    let log = logging::Logger::new(name);

    let result = match &args.command {
        cli::Command::Build(opts) => commands::build::run(&args.global, opts, &log),
        cli::Command::Deploy(opts) => commands::deploy::run(&args.global, opts, &log),
        cli::Command::Undeploy(opts) => commands::undeploy::run(&args.global, opts, &log),
        cli::Command::Info => commands::info::run(&args.global, &log),
        cli::Command::Status(opts) => commands::status::run(&args.global, opts, &log),
        cli::Command::Version | cli::Command::Completions(_) => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log.error(&error::render(&err));
            log.print_log_location();
            ExitCode::from(error::exit_code(&err))
        }
    }
}
