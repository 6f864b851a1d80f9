//! Scoped undo log for one deploy attempt.
//!
//! Every filesystem change is recorded as an [`Action`] the moment it
//! succeeds. On failure the actions are undone in reverse order; on success
//! they become the deployment record.
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Result;

use super::record::{Action, DeployMode, DeploymentRecord, RECORD_FORMAT_VERSION};
use crate::build::{BuildId, LinkEntry};
use crate::error::{ApplyError, RollbackReport, Shortfall};
use crate::logging::Log;
use crate::resources::copy::CopyResource;
use crate::resources::helpers::fs::{missing_ancestors, move_path, occupant};
use crate::resources::symlink::SymlinkResource;
use crate::resources::{self, Resource, ResourceChange, occupied};

/// Outcome of undoing one action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Undo {
    /// The action was reversed.
    Done,
    /// There was nothing left to reverse.
    AlreadyGone,
    /// The path was deliberately left as it is.
    LeftAlone(String),
}

/// Where the object displaced from `target` is kept.
#[must_use]
pub fn backup_path(backup_dir: &Path, index: usize, target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map_or_else(|| "root".into(), |n| n.to_string_lossy());
    backup_dir.join(format!("{index:04}-{name}"))
}

/// Applied actions of an in-progress deploy.
#[derive(Debug)]
pub struct Transaction {
    backup_dir: PathBuf,
    actions: Vec<Action>,
}

impl Transaction {
    /// Start an empty transaction that keeps displaced objects in `backup_dir`.
    #[must_use]
    pub const fn new(backup_dir: PathBuf) -> Self {
        Self {
            backup_dir,
            actions: Vec::new(),
        }
    }

    /// Actions applied so far.
    #[must_use]
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Create every missing ancestor of `target`, outermost first.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::Io`] if a directory cannot be created.
    pub fn create_parents(&mut self, target: &Path, log: &dyn Log) -> Result<(), ApplyError> {
        for dir in missing_ancestors(target) {
            fs::create_dir(&dir).map_err(|source| ApplyError::Io {
                action: "create directory",
                path: dir.clone(),
                source,
            })?;
            log.debug(&format!("created directory {}", dir.display()));
            self.actions.push(Action::CreateDir { path: dir });
        }
        Ok(())
    }

    /// Move whatever is at `target` into the backup directory.
    ///
    /// # Errors
    ///
    /// Returns an [`ApplyError`] if the target cannot be inspected or moved.
    pub fn displace(&mut self, target: &Path, log: &dyn Log) -> Result<(), ApplyError> {
        let found = occupant(target).map_err(|source| ApplyError::Io {
            action: "inspect",
            path: target.to_path_buf(),
            source,
        })?;
        if found.is_none() {
            return Ok(());
        }
        let backup = backup_path(&self.backup_dir, self.actions.len(), target);
        move_path(target, &backup).map_err(|e| ApplyError::Step {
            path: target.to_path_buf(),
            message: format!("{e:#}"),
        })?;
        log.debug(&format!(
            "moved {} to {}",
            target.display(),
            backup.display()
        ));
        self.actions.push(Action::Displace {
            target: target.to_path_buf(),
            backup,
        });
        Ok(())
    }

    /// Create the symlink or copy for `entry`. The target must be free.
    ///
    /// # Errors
    ///
    /// Returns [`ApplyError::TargetAppeared`] if something exists at the
    /// target, or [`ApplyError::Step`] if the resource cannot be applied.
    pub fn materialize(
        &mut self,
        entry: &LinkEntry,
        mode: DeployMode,
        ignore: &[String],
        log: &dyn Log,
    ) -> Result<(), ApplyError> {
        if occupied(&entry.target) {
            return Err(ApplyError::TargetAppeared(entry.target.clone()));
        }
        let resource = resources::for_entry(entry, mode, ignore);
        resource.apply().map_err(|e| ApplyError::Step {
            path: entry.target.clone(),
            message: format!("{e:#}"),
        })?;
        log.debug(&resource.description());
        self.actions.push(planned_action(entry, mode));
        Ok(())
    }

    /// The record committing this transaction.
    #[must_use]
    pub fn record(&self, build: &BuildId, mode: DeployMode) -> DeploymentRecord {
        DeploymentRecord {
            version: RECORD_FORMAT_VERSION,
            build: build.clone(),
            mode,
            deployed_at: chrono::Utc::now(),
            backup_dir: self.backup_dir.clone(),
            actions: self.actions.clone(),
        }
    }

    /// Undo every applied action in reverse order, best effort.
    #[must_use]
    pub fn rollback(self, log: &dyn Log) -> RollbackReport {
        let mut report = RollbackReport::default();
        for action in self.actions.iter().rev() {
            match undo(action) {
                Ok(Undo::Done | Undo::AlreadyGone) => {
                    report.reverted += 1;
                    log.debug(&format!("rolled back: {action}"));
                }
                Ok(Undo::LeftAlone(reason)) => {
                    log.warn(&format!(
                        "rollback left {} in place: {reason}",
                        action.path().display()
                    ));
                    report.shortfall.push(Shortfall {
                        path: action.path().to_path_buf(),
                        message: reason,
                    });
                }
                Err(e) => {
                    log.error(&format!("rollback of '{action}' failed: {e:#}"));
                    report.shortfall.push(Shortfall {
                        path: action.path().to_path_buf(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }
        if report.is_complete() {
            remove_backup_dir(&self.backup_dir);
        } else if self.backup_dir.exists() {
            report.backup_dir = Some(self.backup_dir);
        }
        report
    }
}

/// Reverse one recorded action.
///
/// Symlinks and copies that no longer match what was deployed, and created
/// directories that are no longer empty, are left alone.
///
/// # Errors
///
/// Returns an error if the reversal is needed but fails, including when a
/// displaced original cannot be moved back because its old location is taken.
pub fn undo(action: &Action) -> Result<Undo> {
    match action {
        Action::CreateDir { path } => match fs::remove_dir(path) {
            Ok(()) => Ok(Undo::Done),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Undo::AlreadyGone),
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => {
                Ok(Undo::LeftAlone("directory not empty".to_string()))
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("removing directory {}", path.display()))),
        },
        Action::Displace { target, backup } => {
            if occupied(target) {
                anyhow::bail!(
                    "{} is occupied; original kept at {}",
                    target.display(),
                    backup.display()
                );
            }
            if !occupied(backup) {
                anyhow::bail!("backup {} is missing", backup.display());
            }
            move_path(backup, target)?;
            Ok(Undo::Done)
        }
        Action::Symlink { target, source, .. } => Ok(change_to_undo(
            SymlinkResource::new(source.clone(), target.clone()).remove()?,
        )),
        Action::Copy {
            target,
            source,
            kind,
        } => Ok(change_to_undo(
            CopyResource::new(source.clone(), target.clone(), *kind, Vec::new()).remove()?,
        )),
    }
}

fn change_to_undo(change: ResourceChange) -> Undo {
    match change {
        ResourceChange::Applied => Undo::Done,
        ResourceChange::AlreadyCorrect => Undo::AlreadyGone,
        ResourceChange::Skipped { reason } => Undo::LeftAlone(reason),
    }
}

/// Remove an emptied backup directory and its per-build parent if empty.
pub fn remove_backup_dir(backup_dir: &Path) {
    let _ = fs::remove_dir(backup_dir);
    if let Some(parent) = backup_dir.parent() {
        let _ = fs::remove_dir(parent);
    }
}

/// The action that materializes `entry` in `mode`.
#[must_use]
pub fn planned_action(entry: &LinkEntry, mode: DeployMode) -> Action {
    let (target, source, kind) = (entry.target.clone(), entry.source.clone(), entry.kind);
    match mode {
        DeployMode::Symlink => Action::Symlink {
            target,
            source,
            kind,
        },
        DeployMode::Hard => Action::Copy {
            target,
            source,
            kind,
        },
    }
}
