use anyhow::Result;

use crate::cli::{GlobalOpts, UndeployOpts};
use crate::deploy::{Deployer, UndeployOutcome};
use crate::logging::Logger;

/// Run the undeploy command.
///
/// Without `--build`, the most recently deployed build is undeployed.
///
/// # Errors
///
/// Returns an error if the selected build does not exist, its record cannot
/// be read, or some actions could not be reversed.
pub fn run(global: &GlobalOpts, opts: &UndeployOpts, log: &Logger) -> Result<()> {
    let store = super::open_store(global, log)?;
    let id = match &opts.build {
        Some(selector) => store.resolve(selector)?,
        None => match store.latest_record()? {
            Some(record) => record.build,
            None => {
                log.info("nothing is deployed");
                return Ok(());
            }
        },
    };

    match Deployer::new(&store).undeploy(&id, opts.dry_run, log)? {
        UndeployOutcome::Planned(actions) => {
            log.info(&format!("{} action(s) would be reversed", actions.len()));
        }
        UndeployOutcome::NothingDeployed | UndeployOutcome::Undeployed { .. } => {}
    }
    Ok(())
}
