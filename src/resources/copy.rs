//! Copy resource for hard deploys.
use anyhow::{Context as _, Result};
use std::fs;
use std::path::PathBuf;

use super::helpers::fs::{CopyOptions, copy_dir_recursive, occupant, remove_path};
use super::{Resource, ResourceChange, ResourceState, occupied};
use crate::build::EntryKind;
use crate::error::Occupant;

/// A copy of `source` at `target`, severed from the module tree.
#[derive(Debug, Clone)]
pub struct CopyResource {
    /// What is copied.
    pub source: PathBuf,
    /// Where the copy goes.
    pub target: PathBuf,
    /// File or directory.
    pub kind: EntryKind,
    /// File names skipped inside copied directories.
    pub skip: Vec<String>,
}

impl CopyResource {
    /// Create a new copy resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf, kind: EntryKind, skip: Vec<String>) -> Self {
        Self {
            source,
            target,
            kind,
            skip,
        }
    }

    /// What the copy is on disk. A file entry that is a symlink to a
    /// directory is copied through the link as a directory.
    fn copied_kind(&self) -> EntryKind {
        match self.kind {
            EntryKind::File if self.source.is_dir() => EntryKind::Directory,
            kind => kind,
        }
    }

    fn copy(&self) -> Result<()> {
        match self.copied_kind() {
            EntryKind::File => fs::copy(&self.source, &self.target).map(|_| ()).with_context(|| {
                format!(
                    "copying {} to {}",
                    self.source.display(),
                    self.target.display()
                )
            }),
            EntryKind::Directory => copy_dir_recursive(
                &self.source,
                &self.target,
                CopyOptions {
                    follow_symlinks: true,
                    skip: &self.skip,
                },
            ),
        }
    }
}

impl Resource for CopyResource {
    fn description(&self) -> String {
        format!(
            "{} <= {} ({} copy)",
            self.target.display(),
            self.source.display(),
            self.kind
        )
    }

    fn apply(&self) -> Result<ResourceChange> {
        if occupied(&self.target) {
            anyhow::bail!("target already exists: {}", self.target.display());
        }
        if let Err(e) = self.copy() {
            if let Err(cleanup) = remove_path(&self.target) {
                return Err(e.context(format!(
                    "partial copy left at {}: {cleanup:#}",
                    self.target.display()
                )));
            }
            return Err(e);
        }
        Ok(ResourceChange::Applied)
    }

    fn remove(&self) -> Result<ResourceChange> {
        let current = occupant(&self.target)
            .with_context(|| format!("inspecting {}", self.target.display()))?;
        let expected = match self.copied_kind() {
            EntryKind::File => Occupant::File,
            EntryKind::Directory => Occupant::Directory,
        };
        match current {
            None => Ok(ResourceChange::AlreadyCorrect),
            Some(found) if found == expected => {
                remove_path(&self.target)?;
                Ok(ResourceChange::Applied)
            }
            Some(found) => Ok(ResourceChange::Skipped {
                reason: format!("replaced by a {found}"),
            }),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        if !self.source.exists() {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        }
        let current = occupant(&self.target)
            .with_context(|| format!("inspecting {}", self.target.display()))?;
        Ok(match (self.copied_kind(), current) {
            (_, None) => ResourceState::Missing,
            (_, Some(Occupant::Symlink)) => ResourceState::Incorrect {
                current: "target is a symlink".to_string(),
            },
            (EntryKind::File, Some(Occupant::File)) => {
                let same = fs::read(&self.source).ok() == fs::read(&self.target).ok();
                if same {
                    ResourceState::Correct
                } else {
                    ResourceState::Incorrect {
                        current: "content differs".to_string(),
                    }
                }
            }
            (EntryKind::Directory, Some(Occupant::Directory)) => ResourceState::Correct,
            (_, Some(found)) => ResourceState::Incorrect {
                current: format!("target is a {found}"),
            },
        })
    }
}
