use anyhow::Result;

use crate::cli::{GlobalOpts, StatusOpts};
use crate::deploy::{self, DeployMode};
use crate::logging::Logger;
use crate::resources::ResourceState;

/// Run the status command.
///
/// Without `--build`, the most recently deployed build is inspected, or the
/// latest build if nothing is deployed. A deployed build is checked in the
/// mode it was deployed with; any other build as symlinks.
///
/// # Errors
///
/// Returns an error if the build cannot be found or the store cannot be read.
pub fn run(global: &GlobalOpts, opts: &StatusOpts, log: &Logger) -> Result<()> {
    let store = super::open_store(global, log)?;
    let build = match (&opts.build, store.latest_record()?) {
        (Some(selector), _) => store.select(Some(selector.as_str()))?,
        (None, Some(record)) => store.get(&record.build)?,
        (None, None) => store.latest()?,
    };
    let record = store.load_record(&build.id)?;
    let mode = record.as_ref().map_or(DeployMode::Symlink, |r| r.mode);

    log.stage(&format!(
        "Build {} ({}, {mode} mode)",
        build.id,
        if record.is_some() { "deployed" } else { "not deployed" }
    ));

    let states = deploy::status(&build, mode);
    let mut correct = 0;
    for status in &states {
        let line = match &status.state {
            ResourceState::Correct => {
                correct += 1;
                format!("ok       {}", status.target.display())
            }
            ResourceState::Missing => format!("missing  {}", status.target.display()),
            ResourceState::Incorrect { current } => {
                format!("differs  {} ({current})", status.target.display())
            }
            ResourceState::Invalid { reason } => {
                format!("invalid  {} ({reason})", status.target.display())
            }
        };
        log.info(&line);
    }
    log.info(&format!("{correct}/{} entries in place", states.len()));
    Ok(())
}
