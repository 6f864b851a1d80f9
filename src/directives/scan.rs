//! Depth-first scan of a module tree.
use std::fs;
use std::path::{Component, Path, PathBuf};

use super::{Directive, Markers, MarkersFound, resolve};
use crate::build::{EntryKind, Module};
use crate::error::ConfigError;

/// One entry produced by scanning a module, relative to its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Path relative to the module source; empty for the module root.
    pub relative: PathBuf,
    /// File or directory.
    pub kind: EntryKind,
}

/// A directory child, already classified.
struct Child {
    name: PathBuf,
    is_dir: bool,
}

/// Scan `module` and return its entries in traversal order.
///
/// Parents are resolved before their children, children are visited in
/// file-name order, symlinks are never followed, and marker files never
/// become entries.
///
/// # Errors
///
/// Returns a [`ConfigError`] for an invalid config directive path, a
/// directory carrying both markers, or a directory that cannot be read.
pub fn scan(module: &Module, markers: &Markers) -> Result<Vec<ResolvedPath>, ConfigError> {
    for relative in module.directives.keys() {
        validate_directive_path(&module.source, relative)?;
    }
    let mut out = Vec::new();
    visit(module, markers, Path::new(""), &mut out)?;
    Ok(out)
}

fn visit(
    module: &Module,
    markers: &Markers,
    relative: &Path,
    out: &mut Vec<ResolvedPath>,
) -> Result<(), ConfigError> {
    let dir = module.source.join(relative);
    let (children, found) = read_children(&dir, markers)?;
    let directive = resolve(&dir, found, module.directives.get(relative).copied())?;

    match directive {
        Directive::LinkThis => out.push(ResolvedPath {
            relative: relative.to_path_buf(),
            kind: EntryKind::Directory,
        }),
        Directive::LinkThese => {
            for child in children {
                out.push(ResolvedPath {
                    relative: relative.join(&child.name),
                    kind: if child.is_dir {
                        EntryKind::Directory
                    } else {
                        EntryKind::File
                    },
                });
            }
        }
        Directive::None => {
            for child in children {
                let child_relative = relative.join(&child.name);
                if child.is_dir {
                    visit(module, markers, &child_relative, out)?;
                } else {
                    out.push(ResolvedPath {
                        relative: child_relative,
                        kind: EntryKind::File,
                    });
                }
            }
        }
    }
    Ok(())
}

/// List `dir`'s children sorted by name, excluding markers, and report which
/// markers were present.
fn read_children(dir: &Path, markers: &Markers) -> Result<(Vec<Child>, MarkersFound), ConfigError> {
    let scan_err = |source| ConfigError::Scan {
        path: dir.to_path_buf(),
        source,
    };
    let mut found = MarkersFound::default();
    let mut children = Vec::new();
    for entry in fs::read_dir(dir).map_err(scan_err)? {
        let entry = entry.map_err(scan_err)?;
        let name = entry.file_name();
        if name == markers.linkthis.as_str() {
            found.linkthis = true;
            continue;
        }
        if name == markers.linkthese.as_str() {
            found.linkthese = true;
            continue;
        }
        // file_type() does not follow symlinks, so a symlinked directory
        // stays an opaque leaf.
        let file_type = entry.file_type().map_err(scan_err)?;
        children.push(Child {
            name: PathBuf::from(name),
            is_dir: file_type.is_dir(),
        });
    }
    children.sort_by(|a, b| a.name.cmp(&b.name));
    Ok((children, found))
}

/// Check that a config directive key names a real directory inside the module.
fn validate_directive_path(source: &Path, relative: &Path) -> Result<(), ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidDirectivePath {
        path: relative.to_path_buf(),
        reason: reason.to_string(),
    };
    if relative.is_absolute() {
        return Err(invalid("must be relative to the module source"));
    }
    if relative
        .components()
        .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)))
    {
        return Err(invalid("must not leave the module source"));
    }
    match fs::symlink_metadata(source.join(relative)) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(invalid("not a directory")),
        Err(_) => Err(invalid("does not exist")),
    }
}
