//! Virtual filesystem builder.
//!
//! Walks every module through the directive scan, maps each resolved path to
//! its target, and rejects the whole build if two entries claim the same
//! target or one entry sits above another entry's target.
pub mod types;

pub use types::{
    BUILD_FORMAT_VERSION, Build, BuildDraft, BuildId, EntryKind, LinkEntry, Module, ModuleSummary,
};

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use crate::directives::{self, Markers};
use crate::error::{Claim, Collision, ConflictError, DullError};
use crate::logging::Log;
use crate::store::BuildStore;

/// Metadata attached to a new build.
#[derive(Debug, Clone, Default)]
pub struct BuildMeta {
    /// Optional human label (`build --name`).
    pub label: Option<String>,
    /// Config file the modules came from.
    pub config: Option<PathBuf>,
}

/// Resolves an ordered module list into a build.
#[derive(Debug, Clone)]
pub struct Builder<'a> {
    modules: &'a [Module],
    markers: &'a Markers,
}

impl<'a> Builder<'a> {
    /// Create a builder over `modules`.
    #[must_use]
    pub const fn new(modules: &'a [Module], markers: &'a Markers) -> Self {
        Self { modules, markers }
    }

    /// Resolve every module into link entries, in module order then
    /// traversal order.
    ///
    /// # Errors
    ///
    /// Returns [`DullError::Config`] for directive problems and
    /// [`DullError::Conflict`] listing every collision.
    pub fn entries(&self, log: &dyn Log) -> Result<Vec<LinkEntry>, DullError> {
        let mut entries = Vec::new();
        for (index, module) in self.modules.iter().enumerate() {
            let resolved = directives::scan(module, self.markers)?;
            log.debug(&format!(
                "module #{} {} -> {}: {} entries",
                index + 1,
                module.source.display(),
                module.target.display(),
                resolved.len()
            ));
            entries.extend(resolved.into_iter().map(|r| LinkEntry {
                target: join_relative(&module.target, &r.relative),
                source: join_relative(&module.source, &r.relative),
                kind: r.kind,
                module: index,
            }));
        }

        let collisions = find_collisions(&entries, self.modules);
        if !collisions.is_empty() {
            return Err(ConflictError { collisions }.into());
        }
        Ok(entries)
    }

    /// Resolve the modules into an unsaved build.
    ///
    /// # Errors
    ///
    /// See [`entries`](Self::entries).
    pub fn draft(&self, meta: BuildMeta, log: &dyn Log) -> Result<BuildDraft, DullError> {
        let entries = self.entries(log)?;
        Ok(BuildDraft {
            label: meta.label,
            config: meta.config,
            modules: self.modules.iter().map(ModuleSummary::from).collect(),
            ignore: self.markers.names(),
            entries,
        })
    }

    /// Resolve the modules and persist the result as a new build.
    ///
    /// Nothing is written unless resolution succeeds.
    ///
    /// # Errors
    ///
    /// Returns the resolution errors of [`entries`](Self::entries) or a
    /// [`DullError::Store`] if the build cannot be saved.
    pub fn build(
        &self,
        store: &BuildStore,
        meta: BuildMeta,
        log: &dyn Log,
    ) -> Result<Build, DullError> {
        let draft = self.draft(meta, log)?;
        if draft.entries.is_empty() {
            log.warn("build has no entries");
        }
        Ok(store.save(draft)?)
    }
}

/// `base` joined with `relative`, or `base` itself for the empty path.
fn join_relative(base: &Path, relative: &Path) -> PathBuf {
    if relative.as_os_str().is_empty() {
        base.to_path_buf()
    } else {
        base.join(relative)
    }
}

/// Find every target claimed more than once, including entries whose target
/// is an ancestor of another entry's target.
///
/// Collisions are ordered by their earliest claim; claims within a collision
/// follow entry order.
#[must_use]
pub fn find_collisions(entries: &[LinkEntry], modules: &[Module]) -> Vec<Collision> {
    let mut by_target: BTreeMap<&Path, Vec<(usize, &LinkEntry)>> = BTreeMap::new();
    for (index, entry) in entries.iter().enumerate() {
        by_target
            .entry(entry.target.as_path())
            .or_default()
            .push((index, entry));
    }

    let mut groups: BTreeMap<&Path, Vec<(usize, &LinkEntry)>> = BTreeMap::new();
    for (&target, claims) in &by_target {
        let mut group = if claims.len() > 1 {
            claims.clone()
        } else {
            Vec::new()
        };

        // Descendants sort directly after their ancestor.
        let descendants = by_target
            .range::<&Path, _>((Bound::Excluded(target), Bound::Unbounded))
            .take_while(|(t, _)| t.starts_with(target))
            .flat_map(|(_, c)| c.iter().copied());
        let mut overlapping = descendants.peekable();
        if overlapping.peek().is_some() {
            if group.is_empty() {
                group.extend(claims.iter().copied());
            }
            group.extend(overlapping);
        }

        if !group.is_empty() {
            group.sort_by_key(|(index, _)| *index);
            groups.insert(target, group);
        }
    }

    let mut collisions: Vec<(usize, Collision)> = groups
        .into_iter()
        .map(|(target, group)| {
            let first = group.first().map_or(0, |(index, _)| *index);
            let claims = group
                .into_iter()
                .map(|(_, entry)| Claim {
                    module: entry.module,
                    module_source: modules
                        .get(entry.module)
                        .map(|m| m.source.clone())
                        .unwrap_or_default(),
                    source: entry.source.clone(),
                    target: entry.target.clone(),
                })
                .collect();
            (
                first,
                Collision {
                    target: target.to_path_buf(),
                    claims,
                },
            )
        })
        .collect();
    collisions.sort_by_key(|(first, _)| *first);
    collisions.into_iter().map(|(_, c)| c).collect()
}
