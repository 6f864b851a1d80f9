//! Directive resolution: how each directory of a module is linked.
//!
//! [`resolve`] is the pure decision for one directory; [`scan`] walks a module
//! tree on disk and applies it.
mod scan;

pub use scan::{ResolvedPath, scan};

use std::ffi::OsStr;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default marker file name for [`Directive::LinkThis`].
pub const DEFAULT_LINKTHIS_FILE: &str = ".dull-linkthis";
/// Default marker file name for [`Directive::LinkThese`].
pub const DEFAULT_LINKTHESE_FILE: &str = ".dull-linkthese";

/// How a directory's contents are linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Directive {
    /// Recurse and link every file individually.
    #[default]
    None,
    /// Link the directory itself as one unit.
    LinkThis,
    /// Link each immediate child as one unit.
    LinkThese,
}

/// Marker file names that carry directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// File name signalling [`Directive::LinkThis`].
    pub linkthis: String,
    /// File name signalling [`Directive::LinkThese`].
    pub linkthese: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            linkthis: DEFAULT_LINKTHIS_FILE.to_string(),
            linkthese: DEFAULT_LINKTHESE_FILE.to_string(),
        }
    }
}

impl Markers {
    /// Whether `name` is one of the marker file names.
    #[must_use]
    pub fn is_marker(&self, name: &OsStr) -> bool {
        name == OsStr::new(&self.linkthis) || name == OsStr::new(&self.linkthese)
    }

    /// Marker names, for builds to record as never-materialized.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        vec![self.linkthis.clone(), self.linkthese.clone()]
    }
}

/// Which marker files were found in a directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarkersFound {
    /// The `linkthis` marker is present.
    pub linkthis: bool,
    /// The `linkthese` marker is present.
    pub linkthese: bool,
}

/// Decide the directive for the directory at `path`.
///
/// A config override wins over markers. Both markers at once is an error.
///
/// # Errors
///
/// Returns [`ConfigError::ConflictingDirectives`] when both markers are
/// present and no override settles it.
pub fn resolve(
    path: &Path,
    found: MarkersFound,
    config_override: Option<Directive>,
) -> Result<Directive, ConfigError> {
    if let Some(directive) = config_override {
        return Ok(directive);
    }
    match (found.linkthis, found.linkthese) {
        (true, true) => Err(ConfigError::ConflictingDirectives {
            path: path.to_path_buf(),
        }),
        (true, false) => Ok(Directive::LinkThis),
        (false, true) => Ok(Directive::LinkThese),
        (false, false) => Ok(Directive::None),
    }
}
