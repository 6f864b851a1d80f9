//! Command: generate shell completions.
use clap::CommandFactory;

use crate::cli::{Cli, CompletionsOpts};

/// Write the completion script for the requested shell to stdout.
pub fn run(opts: &CompletionsOpts) {
    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(opts.shell, &mut command, name, &mut std::io::stdout());
}
