use anyhow::Result;

use crate::cli::{DeployOpts, GlobalOpts};
use crate::deploy::{Action, DeployMode, DeployOptions, DeployOutcome, Deployer};
use crate::interrupt::Interrupt;
use crate::logging::Logger;

/// Run the deploy command.
///
/// # Errors
///
/// Returns an error if the build cannot be found, the pre-check finds
/// occupied targets without `--force`, or applying fails (after rollback).
pub fn run(global: &GlobalOpts, opts: &DeployOpts, log: &Logger) -> Result<()> {
    let store = super::open_store(global, log)?;
    let build = store.select(opts.build.as_deref())?;

    let options = DeployOptions {
        mode: if opts.hard {
            DeployMode::Hard
        } else {
            DeployMode::Symlink
        },
        force: opts.force,
        dry_run: opts.dry_run,
    };
    let deployer = Deployer::new(&store).with_interrupt(Interrupt::install()?);

    match deployer.deploy(&build, options, log)? {
        DeployOutcome::Deployed(record) => {
            let displaced = record
                .actions
                .iter()
                .any(|a| matches!(a, Action::Displace { .. }));
            if displaced {
                log.info(&format!(
                    "displaced originals kept in {}",
                    record.backup_dir.display()
                ));
            }
        }
        DeployOutcome::Planned(actions) => {
            log.info(&format!("{} action(s) would be performed", actions.len()));
        }
    }
    Ok(())
}
