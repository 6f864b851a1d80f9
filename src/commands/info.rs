use anyhow::Result;
use std::collections::HashSet;

use crate::cli::GlobalOpts;
use crate::logging::Logger;

/// Run the info command: list stored builds, oldest first.
///
/// # Errors
///
/// Returns an error if the store cannot be read.
pub fn run(global: &GlobalOpts, log: &Logger) -> Result<()> {
    let store = super::open_store(global, log)?;
    log.stage(&format!("Builds in {}", store.root().display()));

    let ids: Vec<_> = store.list()?.collect();
    if ids.is_empty() {
        log.info("no builds in store");
        return Ok(());
    }
    let deployed: HashSet<_> = store.records()?.into_iter().map(|r| r.build).collect();
    let latest = ids.last().cloned();

    for id in &ids {
        let build = store.get(id)?;
        let mut markers = Vec::new();
        if latest.as_ref() == Some(id) {
            markers.push("latest");
        }
        if deployed.contains(id) {
            markers.push("deployed");
        }
        let markers = if markers.is_empty() {
            String::new()
        } else {
            format!(" [{}]", markers.join(", "))
        };
        log.info(&format!(
            "{id}  {:<12} {:>5} entries{markers}",
            build.label.as_deref().unwrap_or("-"),
            build.len()
        ));
    }
    Ok(())
}
