//! Deployment records: the filesystem actions a committed deploy performed.
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::build::{BuildId, EntryKind};

/// On-disk format version written into every deployment record.
pub const RECORD_FORMAT_VERSION: u32 = 1;

/// How entries are materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// A symlink at each target pointing at its source.
    #[default]
    Symlink,
    /// A copy of each source at its target.
    Hard,
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Symlink => "symlink",
            Self::Hard => "hard",
        })
    }
}

/// One filesystem change, recorded when it succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// A missing ancestor directory was created.
    CreateDir {
        /// The created directory.
        path: PathBuf,
    },
    /// An existing object was moved out of the way.
    Displace {
        /// Where the object was.
        target: PathBuf,
        /// Where it is kept now.
        backup: PathBuf,
    },
    /// A symlink was created.
    Symlink {
        /// Link location.
        target: PathBuf,
        /// What the link points at.
        source: PathBuf,
        /// Kind of the linked entry.
        kind: EntryKind,
    },
    /// A file or directory was copied.
    Copy {
        /// Copy location.
        target: PathBuf,
        /// What was copied.
        source: PathBuf,
        /// Kind of the copied entry.
        kind: EntryKind,
    },
}

impl Action {
    /// The real-filesystem path this action changed.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::CreateDir { path } => path,
            Self::Displace { target, .. }
            | Self::Symlink { target, .. }
            | Self::Copy { target, .. } => target,
        }
    }

    /// Whether this action put build content at its path.
    #[must_use]
    pub const fn materializes(&self) -> bool {
        matches!(self, Self::Symlink { .. } | Self::Copy { .. })
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreateDir { path } => write!(f, "create directory {}", path.display()),
            Self::Displace { target, backup } => {
                write!(f, "move {} to {}", target.display(), backup.display())
            }
            Self::Symlink { target, source, .. } => {
                write!(f, "link {} -> {}", target.display(), source.display())
            }
            Self::Copy {
                target,
                source,
                kind,
            } => write!(
                f,
                "copy {kind} {} to {}",
                source.display(),
                target.display()
            ),
        }
    }
}

/// The committed deployment of one build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// Format version of the stored file.
    pub version: u32,
    /// Deployed build.
    pub build: BuildId,
    /// Symlink or hard deploy.
    pub mode: DeployMode,
    /// Commit time.
    pub deployed_at: DateTime<Utc>,
    /// Where displaced originals are kept.
    pub backup_dir: PathBuf,
    /// Actions in the order they were applied.
    pub actions: Vec<Action>,
}

impl DeploymentRecord {
    /// Targets currently materialized by this record.
    #[must_use]
    pub fn deployed_paths(&self) -> Vec<PathBuf> {
        self.actions
            .iter()
            .filter(|a| a.materializes())
            .map(|a| a.path().to_path_buf())
            .collect()
    }
}
