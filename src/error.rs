//! Domain-specific error types for the build-and-deploy engine.
//!
//! This module provides a structured error hierarchy using [`thiserror`].
//! Engine modules return typed errors (e.g., [`ConfigError`],
//! [`ConflictError`]) while command handlers at the CLI boundary convert them
//! to [`anyhow::Error`] via the standard `?` operator.  [`exit_code`] walks an
//! [`anyhow::Error`] chain to recover the typed error and pick the process
//! exit status.
//!
//! # Error hierarchy
//!
//! ```text
//! DullError
//! ├── Config(ConfigError)       — module list, directives, module sources
//! ├── Conflict(ConflictError)   — two or more entries claim a target
//! ├── PreCheck(PreCheckError)   — targets occupied and --force absent
//! ├── Store(StoreError)         — build store I/O, parse, not found
//! ├── Deploy(DeployError)       — apply failed (rolled back) or probe failed
//! └── Undeploy(UndeployError)   — reversal left paths deployed
//! ```

use std::fmt::Write as _;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Exit status for configuration and collision errors.
pub const EXIT_CONFIG: u8 = 2;
/// Exit status for pre-check blocking errors.
pub const EXIT_PRECHECK: u8 = 3;
/// Exit status for filesystem and storage errors.
pub const EXIT_IO: u8 = 4;
/// Exit status when a requested build does not exist.
pub const EXIT_NOT_FOUND: u8 = 5;
/// Exit status for anything not covered above.
pub const EXIT_OTHER: u8 = 1;

/// Top-level error type for the engine.
///
/// Aggregates the per-component errors and is convertible to
/// [`anyhow::Error`] for use at CLI command boundaries.
#[derive(Error, Debug)]
pub enum DullError {
    /// Configuration error (module list, directive declarations).
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Two or more link entries claim the same or overlapping targets.
    #[error("Build conflict: {0}")]
    Conflict(#[from] ConflictError),

    /// Deployment targets are already occupied.
    #[error("Pre-check failed: {0}")]
    PreCheck(#[from] PreCheckError),

    /// Build store access failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// A deploy attempt failed.
    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    /// An undeploy left some paths deployed.
    #[error("Undeploy error: {0}")]
    Undeploy(#[from] UndeployError),
}

impl DullError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Conflict(_) => EXIT_CONFIG,
            Self::PreCheck(_) => EXIT_PRECHECK,
            Self::Store(e) => e.exit_code(),
            Self::Deploy(e) => e.exit_code(),
            Self::Undeploy(_) => EXIT_IO,
        }
    }
}

/// Errors that arise from the module list and directive declarations.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {}: {source}", path.display())]
    Read {
        /// Path to the config file.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// The config file is not valid TOML or does not match the schema.
    #[error("invalid config file {}: {message}", path.display())]
    Parse {
        /// Path to the config file.
        path: PathBuf,
        /// Parser message.
        message: String,
    },

    /// A module definition is unusable (missing source, relative target, ...).
    #[error("invalid module {module}: {reason}")]
    InvalidModule {
        /// The module's source as written in the config.
        module: String,
        /// Human-readable reason.
        reason: String,
    },

    /// A directory is declared both `linkthis` and `linkthese`.
    #[error("conflicting directives at {}: marked both linkthis and linkthese", path.display())]
    ConflictingDirectives {
        /// Offending directory.
        path: PathBuf,
    },

    /// A config-declared directive names a path that cannot carry one.
    #[error("invalid directive path {}: {reason}", path.display())]
    InvalidDirectivePath {
        /// Offending path (relative to the module source).
        path: PathBuf,
        /// Human-readable reason.
        reason: String,
    },

    /// A module directory could not be scanned.
    #[error("cannot scan module directory {}: {source}", path.display())]
    Scan {
        /// Directory being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

/// One module's claim on a target path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Zero-based index of the module in the module list.
    pub module: usize,
    /// The module's source directory.
    pub module_source: PathBuf,
    /// Source path of the claiming entry.
    pub source: PathBuf,
    /// Target path of the claiming entry (a descendant for prefix overlaps).
    pub target: PathBuf,
}

/// A target path claimed more than once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collision {
    /// The contested target path.
    pub target: PathBuf,
    /// Every claim on it, in module order then traversal order.
    pub claims: Vec<Claim>,
}

/// Every collision found by a build.
#[derive(Error, Debug)]
#[error("{}", render_collisions(.collisions))]
pub struct ConflictError {
    /// All collisions, in first-claim order.
    pub collisions: Vec<Collision>,
}

fn render_collisions(collisions: &[Collision]) -> String {
    let mut out = format!("{} conflicting target path(s)", collisions.len());
    for collision in collisions {
        let _ = write!(out, "\n  {}", collision.target.display());
        for claim in &collision.claims {
            let _ = write!(
                out,
                "\n    module #{} ({}): {}",
                claim.module + 1,
                claim.module_source.display(),
                claim.source.display()
            );
            if claim.target != collision.target {
                let _ = write!(out, " -> {}", claim.target.display());
            }
        }
    }
    out
}

/// What currently occupies a target path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Occupant {
    /// A regular file.
    File,
    /// A real directory.
    Directory,
    /// A symlink (possibly dangling).
    Symlink,
}

impl std::fmt::Display for Occupant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Directory => "directory",
            Self::Symlink => "symlink",
        })
    }
}

/// Targets that already exist, blocking a deploy without `--force`.
#[derive(Error, Debug)]
#[error("{}", render_blocked(.blocked))]
pub struct PreCheckError {
    /// Every occupied target with what occupies it, in entry order.
    pub blocked: Vec<(PathBuf, Occupant)>,
}

fn render_blocked(blocked: &[(PathBuf, Occupant)]) -> String {
    let mut out = format!(
        "{} target path(s) already exist (use --force to replace them)",
        blocked.len()
    );
    for (path, occupant) in blocked {
        let _ = write!(out, "\n  {} ({occupant})", path.display());
    }
    out
}

/// Errors from the on-disk build store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// A store directory could not be created.
    #[error("cannot create {}: {source}", path.display())]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A store file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A store file could not be written or removed.
    #[error("cannot write {}: {source}", path.display())]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A store file is not valid JSON for its type.
    #[error("corrupt store file {}: {source}", path.display())]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying JSON error.
        source: serde_json::Error,
    },

    /// A value could not be serialized.
    #[error("cannot serialize: {0}")]
    Serialize(#[source] serde_json::Error),

    /// A store file was written by an incompatible version.
    #[error("unsupported format version {version} in {}", path.display())]
    UnsupportedVersion {
        /// File path.
        path: PathBuf,
        /// Version found in the file.
        version: u32,
    },

    /// The requested build does not exist.
    #[error("build not found: {0}")]
    NotFound(String),

    /// No sequence number is left for a new build.
    #[error("build sequence exhausted after {0}")]
    SequenceExhausted(String),
}

impl StoreError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::NotFound(_) => EXIT_NOT_FOUND,
            _ => EXIT_IO,
        }
    }
}

/// Why an apply step failed.
#[derive(Error, Debug)]
pub enum ApplyError {
    /// A filesystem operation failed.
    #[error("{action} {}: {source}", path.display())]
    Io {
        /// What was being done (e.g. `"create directory"`).
        action: &'static str,
        /// Path being operated on.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },

    /// A higher-level step (move, link, copy) failed.
    #[error("{message}")]
    Step {
        /// Path being operated on.
        path: PathBuf,
        /// Full error chain rendered as text.
        message: String,
    },

    /// The target appeared between the pre-check and the apply step.
    #[error("target {} appeared after the pre-check", .0.display())]
    TargetAppeared(PathBuf),

    /// The user interrupted the deploy.
    #[error("interrupted")]
    Interrupted,

    /// Persisting the deployment record failed.
    #[error("could not commit the deployment record: {0}")]
    Commit(#[source] StoreError),
}

/// A reversal step that could not be completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortfall {
    /// Path whose reversal failed.
    pub path: PathBuf,
    /// Error rendered as text.
    pub message: String,
}

/// Outcome of rolling back a failed deploy attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Number of actions reverted.
    pub reverted: usize,
    /// Actions that could not be reverted.
    pub shortfall: Vec<Shortfall>,
    /// Where displaced originals are kept when the rollback was incomplete.
    pub backup_dir: Option<PathBuf>,
}

impl RollbackReport {
    /// Whether every applied action was reverted.
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.shortfall.is_empty()
    }
}

impl std::fmt::Display for RollbackReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_complete() {
            return write!(f, "rolled back {} action(s)", self.reverted);
        }
        write!(
            f,
            "rollback incomplete, {} action(s) could not be reverted:",
            self.shortfall.len()
        )?;
        for item in &self.shortfall {
            write!(f, " {}: {};", item.path.display(), item.message)?;
        }
        if let Some(dir) = &self.backup_dir {
            write!(f, " displaced originals kept in {}", dir.display())?;
        }
        Ok(())
    }
}

/// Errors raised by a deploy attempt after the pre-check.
#[derive(Error, Debug)]
pub enum DeployError {
    /// An apply step failed; the attempt was rolled back.
    #[error("deploying build {build} failed: {cause} ({rollback})")]
    Failed {
        /// Build identifier.
        build: String,
        /// The failure that triggered the rollback.
        #[source]
        cause: ApplyError,
        /// What the rollback achieved.
        rollback: RollbackReport,
    },

    /// A forced deploy of a build whose deployment is still recorded.
    #[error("build {build} is already deployed; undeploy it before deploying it again")]
    AlreadyDeployed {
        /// Build identifier.
        build: String,
    },

    /// Probing a target failed before anything was changed.
    #[error("cannot inspect target {}: {source}", path.display())]
    Probe {
        /// Target being probed.
        path: PathBuf,
        /// Underlying I/O error.
        source: io::Error,
    },
}

impl DeployError {
    /// Process exit status for this error.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::AlreadyDeployed { .. } => EXIT_PRECHECK,
            _ => EXIT_IO,
        }
    }
}

/// Errors raised by undeploy.
#[derive(Error, Debug)]
#[error(
    "undeploying build {build} left {} path(s) deployed: {}",
    .left_deployed.len(),
    render_shortfall(.failures)
)]
pub struct UndeployError {
    /// Build identifier.
    pub build: String,
    /// Reversal steps that failed.
    pub failures: Vec<Shortfall>,
    /// Targets still materialized after the attempt.
    pub left_deployed: Vec<PathBuf>,
}

fn render_shortfall(failures: &[Shortfall]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.path.display(), f.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Pick the process exit status for an error returned by a command.
///
/// Walks the [`anyhow::Error`] chain looking for one of the typed errors of
/// this module; falls back to [`EXIT_OTHER`].
#[must_use]
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<DullError>() {
            return e.exit_code();
        }
        if cause.is::<ConfigError>() || cause.is::<ConflictError>() {
            return EXIT_CONFIG;
        }
        if cause.is::<PreCheckError>() {
            return EXIT_PRECHECK;
        }
        if let Some(e) = cause.downcast_ref::<StoreError>() {
            return e.exit_code();
        }
        if let Some(e) = cause.downcast_ref::<DeployError>() {
            return e.exit_code();
        }
        if cause.is::<UndeployError>() {
            return EXIT_IO;
        }
    }
    EXIT_OTHER
}

/// Render an error chain on one line, skipping causes whose text the outer
/// messages already include.
#[must_use]
pub fn render(err: &anyhow::Error) -> String {
    let mut msg = err.to_string();
    for cause in err.chain().skip(1) {
        let cause = cause.to_string();
        if !msg.contains(&cause) {
            let _ = write!(msg, ": {cause}");
        }
    }
    msg
}
