//! Idempotent resource primitives (check + apply pattern).
//!
//! A resource is one materialized link entry: a symlink or a copy at a
//! target path. The deployment engine applies and removes them; `status`
//! queries their state.
pub mod copy;
pub mod helpers;
pub mod symlink;

use std::path::Path;

use anyhow::Result;

use crate::build::LinkEntry;
use crate::deploy::DeployMode;

/// State of a resource on the real filesystem.
///
/// # Examples
///
/// ```
/// use dull_cli::resources::ResourceState;
///
/// let missing = ResourceState::Missing;
/// let correct = ResourceState::Correct;
/// let wrong = ResourceState::Incorrect { current: "points to /other".into() };
///
/// assert_ne!(missing, correct);
/// assert_ne!(wrong, correct);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Nothing exists at the target.
    Missing,
    /// The target matches the desired state.
    Correct,
    /// Something else exists at the target.
    Incorrect {
        /// What is there instead.
        current: String,
    },
    /// The resource cannot be materialized (e.g. its source is gone).
    Invalid {
        /// Why.
        reason: String,
    },
}

/// Result of applying or removing a resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceChange {
    /// The filesystem was changed.
    Applied,
    /// Nothing needed to change.
    AlreadyCorrect,
    /// The change was deliberately not made.
    Skipped {
        /// Why the resource was left alone.
        reason: String,
    },
}

/// A link entry materialized one particular way.
pub trait Resource: std::fmt::Debug + Send + Sync {
    /// Human-readable description of this resource.
    fn description(&self) -> String;

    /// Materialize the resource. The target's parent must exist and the
    /// target itself must be free.
    ///
    /// # Errors
    ///
    /// Returns an error if the symlink or copy cannot be created. A partial
    /// copy is removed before returning.
    fn apply(&self) -> Result<ResourceChange>;

    /// Undo a previous [`apply`](Self::apply).
    ///
    /// Returns [`ResourceChange::Skipped`] when the target no longer holds
    /// what `apply` put there, and [`ResourceChange::AlreadyCorrect`] when
    /// the target is already gone.
    ///
    /// # Errors
    ///
    /// Returns an error if the target cannot be removed.
    fn remove(&self) -> Result<ResourceChange>;

    /// Check the current state of the resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be determined.
    fn current_state(&self) -> Result<ResourceState>;
}

/// Build the resource that materializes `entry` in `mode`.
///
/// `ignore` lists file names skipped when copying directories.
#[must_use]
pub fn for_entry(entry: &LinkEntry, mode: DeployMode, ignore: &[String]) -> Box<dyn Resource> {
    match mode {
        DeployMode::Symlink => Box::new(symlink::SymlinkResource::new(
            entry.source.clone(),
            entry.target.clone(),
        )),
        DeployMode::Hard => Box::new(copy::CopyResource::new(
            entry.source.clone(),
            entry.target.clone(),
            entry.kind,
            ignore.to_vec(),
        )),
    }
}

/// Whether anything (including a dangling symlink) exists at `path`.
#[must_use]
pub fn occupied(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::build::EntryKind;
    use std::path::PathBuf;

    fn entry() -> LinkEntry {
        LinkEntry {
            target: PathBuf::from("/out/a"),
            source: PathBuf::from("/m/a"),
            kind: EntryKind::File,
            module: 0,
        }
    }

    #[test]
    fn for_entry_picks_resource_by_mode() {
        let link = for_entry(&entry(), DeployMode::Symlink, &[]);
        assert_eq!(link.description(), "/out/a -> /m/a");
        let copy = for_entry(&entry(), DeployMode::Hard, &[]);
        assert_eq!(copy.description(), "/out/a <= /m/a (file copy)");
    }

    #[test]
    fn occupied_sees_dangling_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("x");
        assert!(!occupied(&path));
        #[cfg(unix)]
        {
            std::os::unix::fs::symlink(tmp.path().join("missing"), &path).unwrap();
            assert!(occupied(&path));
        }
    }
}
