use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::DEFAULT_CONFIG_FILE;

/// Top-level CLI entry point for the dotfile build-and-deploy engine.
#[derive(Parser, Debug)]
#[command(
    name = "dull",
    about = "Build dotfile modules into a virtual tree and deploy it as symlinks or copies",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Parser, Debug, Clone)]
pub struct GlobalOpts {
    /// Module list to read
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Override the build store directory
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scan the configured modules and store a new build
    Build(BuildOpts),
    /// Materialize a stored build onto the filesystem
    Deploy(DeployOpts),
    /// Reverse a committed deployment
    Undeploy(UndeployOpts),
    /// List stored builds
    Info,
    /// Show the state of every entry of a build
    Status(StatusOpts),
    /// Generate shell completions
    Completions(CompletionsOpts),
    /// Print version information
    Version,
}

impl Command {
    /// Subcommand name, used to name its log file.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Build(_) => "build",
            Self::Deploy(_) => "deploy",
            Self::Undeploy(_) => "undeploy",
            Self::Info => "info",
            Self::Status(_) => "status",
            Self::Completions(_) => "completions",
            Self::Version => "version",
        }
    }
}

/// Options for the `build` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct BuildOpts {
    /// Label to attach to the build
    #[arg(short, long)]
    pub name: Option<String>,
}

/// Options for the `deploy` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct DeployOpts {
    /// Build to deploy: id, sequence number, or label (default: latest)
    #[arg(short, long)]
    pub build: Option<String>,

    /// Copy sources instead of symlinking them
    #[arg(long)]
    pub hard: bool,

    /// Move existing targets to a backup directory instead of failing
    #[arg(short, long)]
    pub force: bool,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

/// Options for the `undeploy` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct UndeployOpts {
    /// Build to undeploy (default: the most recently deployed)
    #[arg(short, long)]
    pub build: Option<String>,

    /// Preview changes without applying
    #[arg(short = 'd', long)]
    pub dry_run: bool,
}

/// Options for the `status` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct StatusOpts {
    /// Build to inspect (default: the deployed build, else the latest)
    #[arg(short, long)]
    pub build: Option<String>,
}

/// Options for the `completions` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct CompletionsOpts {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_defaults_to_current_directory_file() {
        let cli = Cli::parse_from(["dull", "build"]);
        assert_eq!(cli.global.config, PathBuf::from("dull.toml"));
        assert_eq!(cli.global.store, None);
    }

    #[test]
    fn parse_build_with_name() {
        let cli = Cli::parse_from(["dull", "-c", "conf/dull.toml", "build", "--name", "work"]);
        assert_eq!(cli.global.config, PathBuf::from("conf/dull.toml"));
        assert!(
            matches!(&cli.command, Command::Build(opts) if opts.name.as_deref() == Some("work")),
            "Expected Build command"
        );
    }

    #[test]
    fn parse_deploy_flags() {
        let cli = Cli::parse_from(["dull", "deploy", "--hard", "--force", "--dry-run", "-b", "3"]);
        assert!(
            matches!(&cli.command, Command::Deploy(_)),
            "Expected Deploy command"
        );
        if let Command::Deploy(opts) = cli.command {
            assert!(opts.hard);
            assert!(opts.force);
            assert!(opts.dry_run);
            assert_eq!(opts.build.as_deref(), Some("3"));
        }
    }

    #[test]
    fn parse_deploy_defaults() {
        let cli = Cli::parse_from(["dull", "deploy"]);
        if let Command::Deploy(opts) = cli.command {
            assert!(!opts.hard);
            assert!(!opts.force);
            assert!(!opts.dry_run);
            assert_eq!(opts.build, None);
        }
    }

    #[test]
    fn parse_undeploy_dry_run_short() {
        let cli = Cli::parse_from(["dull", "undeploy", "-d"]);
        assert!(matches!(cli.command, Command::Undeploy(UndeployOpts { dry_run: true, .. })));
    }

    #[test]
    fn parse_global_store_after_subcommand() {
        let cli = Cli::parse_from(["dull", "info", "--store", "/tmp/s", "-v"]);
        assert_eq!(cli.global.store, Some(PathBuf::from("/tmp/s")));
        assert!(cli.verbose);
        assert!(matches!(cli.command, Command::Info));
    }

    #[test]
    fn parse_completions() {
        let cli = Cli::parse_from(["dull", "completions", "zsh"]);
        assert!(matches!(
            cli.command,
            Command::Completions(CompletionsOpts {
                shell: clap_complete::Shell::Zsh
            })
        ));
    }

    #[test]
    fn parse_version() {
        let cli = Cli::parse_from(["dull", "version"]);
        assert!(matches!(cli.command, Command::Version));
        assert_eq!(cli.command.name(), "version");
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["dull", "install"]).is_err());
    }
}
