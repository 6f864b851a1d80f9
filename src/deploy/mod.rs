//! Deployment engine.
//!
//! A deploy runs in three phases: a parallel read-only pre-check of every
//! target, a sequential apply recorded in a [`Transaction`], and a commit
//! that stores the [`DeploymentRecord`]. Any failure after the pre-check
//! rolls the transaction back before the error is returned.
mod precheck;
mod record;
pub mod transaction;

pub use record::{Action, DeployMode, DeploymentRecord, RECORD_FORMAT_VERSION};
pub use transaction::Transaction;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::build::{Build, BuildId};
use crate::error::{ApplyError, DeployError, DullError, PreCheckError, Shortfall, UndeployError};
use crate::interrupt::Interrupt;
use crate::logging::Log;
use crate::resources::helpers::fs::missing_ancestors;
use crate::resources::{self, ResourceState};
use crate::store::BuildStore;
use precheck::Probe;
use transaction::{Undo, backup_path, planned_action, remove_backup_dir, undo};

/// Options for one deploy.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Symlink or copy.
    pub mode: DeployMode,
    /// Move existing targets aside instead of failing the pre-check.
    pub force: bool,
    /// Only report what would be done.
    pub dry_run: bool,
}

/// What a deploy did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The build was deployed and its record committed.
    Deployed(DeploymentRecord),
    /// Dry run: the actions a real deploy would take.
    Planned(Vec<Action>),
}

/// What an undeploy did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UndeployOutcome {
    /// The build had no deployment record.
    NothingDeployed,
    /// Every recorded action was reversed and the record removed.
    Undeployed {
        /// Number of actions reversed.
        reverted: usize,
    },
    /// Dry run: the actions that would be reversed, in reversal order.
    Planned(Vec<Action>),
}

/// Current state of one entry's target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryStatus {
    /// Target path.
    pub target: PathBuf,
    /// State reported by the entry's resource.
    pub state: ResourceState,
}

/// Deploys and undeploys builds held in a [`BuildStore`].
#[derive(Debug, Clone)]
pub struct Deployer<'a> {
    store: &'a BuildStore,
    interrupt: Interrupt,
}

impl<'a> Deployer<'a> {
    /// Create a deployer over `store`.
    #[must_use]
    pub fn new(store: &'a BuildStore) -> Self {
        Self {
            store,
            interrupt: Interrupt::new(),
        }
    }

    /// Use `interrupt` to abort deploys (builder style).
    #[must_use]
    pub fn with_interrupt(mut self, interrupt: Interrupt) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Materialize `build` onto the real filesystem.
    ///
    /// # Errors
    ///
    /// - [`DullError::PreCheck`] if targets exist and `force` is off;
    ///   nothing is changed.
    /// - [`DullError::Deploy`] if `force` is on and `build` is already
    ///   deployed; nothing is changed.
    /// - [`DullError::Deploy`] if probing fails (nothing changed) or an apply
    ///   step fails (everything rolled back).
    /// - [`DullError::Store`] if the store cannot be read.
    pub fn deploy(
        &self,
        build: &Build,
        options: DeployOptions,
        log: &dyn Log,
    ) -> Result<DeployOutcome, DullError> {
        log.stage(&format!(
            "Deploying build {} ({} mode, {} entries)",
            build.id,
            options.mode,
            build.len()
        ));
        if options.force && self.store.load_record(&build.id)?.is_some() {
            return Err(DeployError::AlreadyDeployed {
                build: build.id.to_string(),
            }
            .into());
        }
        if let Some(current) = self.store.latest_record()? {
            if current.build != build.id {
                log.debug(&format!("build {} is currently deployed", current.build));
            }
        }

        let probes = precheck::probe(&build.entries)?;
        let blocked = precheck::blocked(&probes);
        if !blocked.is_empty() {
            if !options.force {
                return Err(PreCheckError { blocked }.into());
            }
            log.warn(&format!(
                "{} existing target(s) will be moved to the backup directory",
                blocked.len()
            ));
        }

        let backup_dir = self.store.new_backup_dir(&build.id);
        if options.dry_run {
            let planned = plan(&probes, options, &backup_dir);
            for action in &planned {
                log.dry_run(&action.to_string());
            }
            return Ok(DeployOutcome::Planned(planned));
        }

        let mut tx = Transaction::new(backup_dir);
        for probe in &probes {
            if let Err(cause) = self.apply_entry(&mut tx, probe, build, options, log) {
                return Err(fail(build, tx, cause, log));
            }
        }

        let record = tx.record(&build.id, options.mode);
        if let Err(e) = self.store.save_record(&record) {
            return Err(fail(build, tx, ApplyError::Commit(e), log));
        }
        log.info(&format!(
            "deployed {} entries ({} actions)",
            build.len(),
            record.actions.len()
        ));
        Ok(DeployOutcome::Deployed(record))
    }

    fn apply_entry(
        &self,
        tx: &mut Transaction,
        probe: &Probe<'_>,
        build: &Build,
        options: DeployOptions,
        log: &dyn Log,
    ) -> Result<(), ApplyError> {
        if self.interrupt.is_set() {
            return Err(ApplyError::Interrupted);
        }
        let entry = probe.entry;
        tx.create_parents(&entry.target, log)?;
        if options.force && probe.occupant.is_some() {
            tx.displace(&entry.target, log)?;
        }
        tx.materialize(entry, options.mode, &build.ignore, log)
    }

    /// Reverse the committed deployment of build `id`.
    ///
    /// A build without a record is a no-op. If some reversals fail, the
    /// others stay reversed and the record is rewritten to hold only what is
    /// still in place.
    ///
    /// # Errors
    ///
    /// - [`DullError::Undeploy`] naming the paths left deployed.
    /// - [`DullError::Store`] if the record cannot be read or updated.
    pub fn undeploy(
        &self,
        id: &BuildId,
        dry_run: bool,
        log: &dyn Log,
    ) -> Result<UndeployOutcome, DullError> {
        let Some(mut record) = self.store.load_record(id)? else {
            log.info(&format!("build {id} is not deployed; nothing to undeploy"));
            return Ok(UndeployOutcome::NothingDeployed);
        };
        log.stage(&format!(
            "Undeploying build {id} ({} mode, {} actions)",
            record.mode,
            record.actions.len()
        ));

        if dry_run {
            let planned: Vec<Action> = record.actions.iter().rev().cloned().collect();
            for action in &planned {
                log.dry_run(&format!("undo: {action}"));
            }
            return Ok(UndeployOutcome::Planned(planned));
        }

        let mut reverted = 0;
        let mut remaining = Vec::new();
        let mut failures = Vec::new();
        for action in record.actions.iter().rev() {
            match undo(action) {
                Ok(Undo::Done) => {
                    reverted += 1;
                    log.debug(&format!("undid: {action}"));
                }
                Ok(Undo::AlreadyGone) => {
                    log.debug(&format!("already gone: {}", action.path().display()));
                }
                Ok(Undo::LeftAlone(reason)) => {
                    let msg = format!("left {} in place: {reason}", action.path().display());
                    if matches!(action, Action::CreateDir { .. }) {
                        log.debug(&msg);
                    } else {
                        log.warn(&msg);
                    }
                }
                Err(e) => {
                    log.error(&format!("could not undo '{action}': {e:#}"));
                    failures.push(Shortfall {
                        path: action.path().to_path_buf(),
                        message: format!("{e:#}"),
                    });
                    remaining.push(action.clone());
                }
            }
        }

        if failures.is_empty() {
            self.store.remove_record(id)?;
            remove_backup_dir(&record.backup_dir);
            log.info(&format!("undeployed build {id} ({reverted} actions reversed)"));
            return Ok(UndeployOutcome::Undeployed { reverted });
        }

        remaining.reverse();
        let left_deployed = remaining
            .iter()
            .filter(|a| !matches!(a, Action::CreateDir { .. }))
            .map(|a| a.path().to_path_buf())
            .collect();
        record.actions = remaining;
        self.store.save_record(&record)?;
        Err(UndeployError {
            build: id.to_string(),
            failures,
            left_deployed,
        }
        .into())
    }
}

/// Roll back `tx` after `cause` and build the resulting error.
fn fail(build: &Build, tx: Transaction, cause: ApplyError, log: &dyn Log) -> DullError {
    log.warn(&format!(
        "{cause}; rolling back {} action(s)",
        tx.actions().len()
    ));
    let rollback = tx.rollback(log);
    DeployError::Failed {
        build: build.id.to_string(),
        cause,
        rollback,
    }
    .into()
}

/// Actions a deploy would take given the pre-check results.
fn plan(
    probes: &[Probe<'_>],
    options: DeployOptions,
    backup_dir: &Path,
) -> Vec<Action> {
    let mut created = HashSet::new();
    let mut planned = Vec::new();
    for probe in probes {
        let target = &probe.entry.target;
        for dir in missing_ancestors(target) {
            if created.insert(dir.clone()) {
                planned.push(Action::CreateDir { path: dir });
            }
        }
        if options.force && probe.occupant.is_some() {
            planned.push(Action::Displace {
                target: target.clone(),
                backup: backup_path(backup_dir, planned.len(), target),
            });
        }
        planned.push(planned_action(probe.entry, options.mode));
    }
    planned
}

/// State of every entry of `build` as materialized in `mode`, checked in
/// parallel. Entry order is kept.
#[must_use]
pub fn status(build: &Build, mode: DeployMode) -> Vec<EntryStatus> {
    build
        .entries
        .par_iter()
        .map(|entry| {
            let state = resources::for_entry(entry, mode, &build.ignore)
                .current_state()
                .unwrap_or_else(|e| ResourceState::Invalid {
                    reason: format!("{e:#}"),
                });
            EntryStatus {
                target: entry.target.clone(),
                state,
            }
        })
        .collect()
}
