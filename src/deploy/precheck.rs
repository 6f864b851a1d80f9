//! Read-only probe of every target before a deploy mutates anything.
use std::path::PathBuf;

use rayon::prelude::*;

use crate::build::LinkEntry;
use crate::error::{DeployError, Occupant};
use crate::resources::helpers::fs::occupant;

/// What the pre-check found at one entry's target.
#[derive(Debug, Clone, Copy)]
pub struct Probe<'a> {
    /// The entry being deployed.
    pub entry: &'a LinkEntry,
    /// What currently occupies its target, if anything.
    pub occupant: Option<Occupant>,
}

/// Probe every target in parallel. Results keep entry order.
///
/// # Errors
///
/// Returns [`DeployError::Probe`] when a target cannot be inspected for a
/// reason other than not existing.
pub fn probe(entries: &[LinkEntry]) -> Result<Vec<Probe<'_>>, DeployError> {
    entries
        .par_iter()
        .map(|entry| {
            occupant(&entry.target)
                .map(|occupant| Probe { entry, occupant })
                .map_err(|source| DeployError::Probe {
                    path: entry.target.clone(),
                    source,
                })
        })
        .collect()
}

/// Occupied targets, in entry order.
#[must_use]
pub fn blocked(probes: &[Probe<'_>]) -> Vec<(PathBuf, Occupant)> {
    probes
        .iter()
        .filter_map(|p| p.occupant.map(|o| (p.entry.target.clone(), o)))
        .collect()
}
