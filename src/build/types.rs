//! Data model shared by the builder, the store and the deployment engine.
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::directives::Directive;

/// On-disk format version written into every build file.
pub const BUILD_FORMAT_VERSION: u32 = 1;

/// Timestamp layout used inside build identifiers.
const ID_STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Whether a link entry materializes a single file or a whole directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// One file (or an opaque symlink inside a module).
    File,
    /// A directory linked or copied as one unit.
    Directory,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::File => "file",
            Self::Directory => "directory",
        })
    }
}

/// The atomic unit that becomes one symlink or one copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    /// Where the entry appears on the real filesystem.
    pub target: PathBuf,
    /// Path inside a module source tree.
    pub source: PathBuf,
    /// File or directory.
    pub kind: EntryKind,
    /// Index of the producing module in the module list.
    pub module: usize,
}

/// A configured module: a source tree and where it is deployed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Absolute, canonical source directory.
    pub source: PathBuf,
    /// Absolute target directory.
    pub target: PathBuf,
    /// Config-declared directives keyed by path relative to `source`
    /// (the empty path is the module root).
    pub directives: BTreeMap<PathBuf, Directive>,
}

impl Module {
    /// Module without config directives.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            directives: BTreeMap::new(),
        }
    }

    /// Attach a config directive for `relative` (builder style).
    #[must_use]
    pub fn with_directive(mut self, relative: impl Into<PathBuf>, directive: Directive) -> Self {
        self.directives.insert(relative.into(), directive);
        self
    }
}

/// Source/target pair recorded in a build for reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSummary {
    /// Module source directory.
    pub source: PathBuf,
    /// Module target directory.
    pub target: PathBuf,
}

impl From<&Module> for ModuleSummary {
    fn from(module: &Module) -> Self {
        Self {
            source: module.source.clone(),
            target: module.target.clone(),
        }
    }
}

/// Chronologically sortable build identifier: `NNNNNN-YYYYMMDDTHHMMSSZ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BuildId {
    sequence: u32,
    raw: String,
}

impl BuildId {
    /// Identifier for the `sequence`th build created at `created_at`.
    #[must_use]
    pub fn new(sequence: u32, created_at: DateTime<Utc>) -> Self {
        Self {
            sequence,
            raw: format!("{sequence:06}-{}", created_at.format(ID_STAMP_FORMAT)),
        }
    }

    /// Parse a full identifier, returning `None` when malformed.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (seq, stamp) = s.split_once('-')?;
        if seq.len() < 6 || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        NaiveDateTime::parse_from_str(stamp, ID_STAMP_FORMAT).ok()?;
        Some(Self {
            sequence: seq.parse().ok()?,
            raw: s.to_string(),
        })
    }

    /// The sequence number part.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl Ord for BuildId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sequence
            .cmp(&other.sequence)
            .then_with(|| self.raw.cmp(&other.raw))
    }
}

impl PartialOrd for BuildId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for BuildId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl TryFrom<String> for BuildId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("malformed build identifier: {value}"))
    }
}

impl From<BuildId> for String {
    fn from(id: BuildId) -> Self {
        id.raw
    }
}

/// A resolved build that has not been stored yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildDraft {
    /// Optional human label.
    pub label: Option<String>,
    /// Config file the build was produced from.
    pub config: Option<PathBuf>,
    /// Modules in configuration order.
    pub modules: Vec<ModuleSummary>,
    /// File names never materialized (directive markers).
    pub ignore: Vec<String>,
    /// Entries in module order, then traversal order.
    pub entries: Vec<LinkEntry>,
}

/// An immutable, stored virtual filesystem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Build {
    /// Format version of the stored file.
    pub version: u32,
    /// Identifier assigned by the store.
    pub id: BuildId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optional human label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Config file the build was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    /// Modules in configuration order.
    pub modules: Vec<ModuleSummary>,
    /// File names never materialized (directive markers).
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Entries in module order, then traversal order. Targets are unique.
    pub entries: Vec<LinkEntry>,
}

impl Build {
    /// Turn a draft into a build with the given identity.
    #[must_use]
    pub fn from_draft(draft: BuildDraft, id: BuildId, created_at: DateTime<Utc>) -> Self {
        Self {
            version: BUILD_FORMAT_VERSION,
            id,
            created_at,
            label: draft.label,
            config: draft.config,
            modules: draft.modules,
            ignore: draft.ignore,
            entries: draft.entries,
        }
    }

    /// Look up the entry for a target path.
    #[must_use]
    pub fn entry(&self, target: &Path) -> Option<&LinkEntry> {
        self.entries.iter().find(|e| e.target == target)
    }

    /// Number of entries.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the build has no entries.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
