pub mod build;
pub mod completions;
pub mod deploy;
pub mod info;
pub mod status;
pub mod undeploy;
pub mod version;

use anyhow::Result;

use crate::cli::GlobalOpts;
use crate::config::Config;
use crate::config::validation;
use crate::logging::Logger;
use crate::store::BuildStore;

/// Load the module list named by `--config` and report validation warnings.
///
/// # Errors
///
/// Returns an error if the config file is missing, malformed, or defines an
/// unusable module.
pub fn load_config(global: &GlobalOpts, log: &Logger) -> Result<Config> {
    log.stage("Loading configuration");
    let config = Config::load(&global.config)?;
    log.debug(&format!("config: {}", config.path.display()));
    log.debug(&format!(
        "markers: {}, {}",
        config.markers.linkthis, config.markers.linkthese
    ));
    log.info(&format!("loaded {} module(s)", config.modules.len()));

    let warnings = validation::validate_all(&config);
    if !warnings.is_empty() {
        log.warn(&format!(
            "found {} configuration warning(s):",
            warnings.len()
        ));
        for warning in &warnings {
            log.warn(&format!(
                "  {} [{}]: {}",
                warning.source, warning.item, warning.message
            ));
        }
    }

    Ok(config)
}

/// Open the build store: `--store` when given, otherwise the store named by
/// the config file.
///
/// # Errors
///
/// Returns an error if the store location has to come from the config file
/// and that cannot be loaded.
pub fn open_store(global: &GlobalOpts, log: &Logger) -> Result<BuildStore> {
    let root = match &global.store {
        Some(dir) => dir.clone(),
        None => load_config(global, log)?.store,
    };
    log.debug(&format!("store: {}", root.display()));
    Ok(BuildStore::new(root))
}
