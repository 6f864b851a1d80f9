use anyhow::Result;

use crate::build::{BuildMeta, Builder};
use crate::cli::{BuildOpts, GlobalOpts};
use crate::logging::Logger;
use crate::store::BuildStore;

/// Run the build command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded, the modules
/// conflict, or the build cannot be stored.
pub fn run(global: &GlobalOpts, opts: &BuildOpts, log: &Logger) -> Result<()> {
    log.info(&format!("dull {}", super::version::version()));
    let config = super::load_config(global, log)?;
    let store = BuildStore::new(global.store.clone().unwrap_or_else(|| config.store.clone()));

    log.stage("Scanning modules");
    let meta = BuildMeta {
        label: opts.name.clone(),
        config: Some(config.path.clone()),
    };
    let build = Builder::new(&config.modules, &config.markers).build(&store, meta, log)?;

    let label = build
        .label
        .as_deref()
        .map(|l| format!(" \"{l}\""))
        .unwrap_or_default();
    log.info(&format!(
        "stored build {}{label} with {} entries",
        build.id,
        build.len()
    ));
    Ok(())
}
