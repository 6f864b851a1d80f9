//! Symlink resource.
use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};

use super::{Resource, ResourceChange, ResourceState};

/// A symlink at `target` pointing at `source`.
#[derive(Debug, Clone)]
pub struct SymlinkResource {
    /// The source file/directory (what the symlink points to).
    pub source: PathBuf,
    /// The target path (where the symlink is created).
    pub target: PathBuf,
}

impl SymlinkResource {
    /// Create a new symlink resource.
    #[must_use]
    pub const fn new(source: PathBuf, target: PathBuf) -> Self {
        Self { source, target }
    }

    fn points_at_source(&self) -> Option<bool> {
        std::fs::read_link(&self.target)
            .ok()
            .map(|existing| paths_equal(&existing, &self.source))
    }
}

impl Resource for SymlinkResource {
    fn description(&self) -> String {
        format!("{} -> {}", self.target.display(), self.source.display())
    }

    fn apply(&self) -> Result<ResourceChange> {
        if self.points_at_source() == Some(true) {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        create_symlink(&self.source, &self.target)?;
        Ok(ResourceChange::Applied)
    }

    fn remove(&self) -> Result<ResourceChange> {
        if self.target.symlink_metadata().is_err() {
            return Ok(ResourceChange::AlreadyCorrect);
        }
        match std::fs::read_link(&self.target) {
            Ok(existing) if paths_equal(&existing, &self.source) => {
                remove_symlink(&self.target)?;
                Ok(ResourceChange::Applied)
            }
            Ok(existing) => Ok(ResourceChange::Skipped {
                reason: format!("now points to {}", existing.display()),
            }),
            Err(_) => Ok(ResourceChange::Skipped {
                reason: "no longer a symlink".to_string(),
            }),
        }
    }

    fn current_state(&self) -> Result<ResourceState> {
        if self.source.symlink_metadata().is_err() {
            return Ok(ResourceState::Invalid {
                reason: format!("source does not exist: {}", self.source.display()),
            });
        }

        std::fs::read_link(&self.target).map_or_else(
            |_| {
                if self.target.symlink_metadata().is_ok() {
                    let what = if self.target.is_dir() {
                        "a real directory"
                    } else {
                        "a regular file"
                    };
                    Ok(ResourceState::Incorrect {
                        current: format!("target is {what}"),
                    })
                } else {
                    Ok(ResourceState::Missing)
                }
            },
            |existing| {
                if paths_equal(&existing, &self.source) {
                    Ok(ResourceState::Correct)
                } else {
                    Ok(ResourceState::Incorrect {
                        current: format!("points to {}", existing.display()),
                    })
                }
            },
        )
    }
}

/// Compare two paths for equality, handling UNC prefix normalization on Windows.
fn paths_equal(a: &Path, b: &Path) -> bool {
    let normalize = |p: &Path| -> PathBuf {
        #[cfg(windows)]
        {
            let s = p.to_string_lossy();
            if let Some(stripped) = s.strip_prefix(r"\\?\") {
                return PathBuf::from(stripped);
            }
        }
        p.to_path_buf()
    };

    normalize(a) == normalize(b)
}

/// Create a symlink at `link` pointing to `target`.
///
/// # Errors
///
/// Returns an error if the link cannot be created, including when `link`
/// already exists.
pub(crate) fn create_symlink(target: &Path, link: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        std::os::unix::fs::symlink(target, link).with_context(|| {
            format!(
                "creating symlink {} -> {}",
                link.display(),
                target.display()
            )
        })?;
    }

    #[cfg(windows)]
    {
        let result = if target.is_dir() {
            std::os::windows::fs::symlink_dir(target, link)
        } else {
            std::os::windows::fs::symlink_file(target, link)
        };
        result.with_context(|| {
            format!(
                "creating symlink {} -> {} (requires developer mode or admin)",
                link.display(),
                target.display()
            )
        })?;
    }

    Ok(())
}

/// Remove a symlink, handling platform differences.
///
/// On Windows, directory symlinks must be removed with `remove_dir` (not
/// `remove_file`). If `remove_dir` still fails with OS error 5 (access
/// denied), fall back to `cmd /c rmdir` which runs in a separate process.
pub(crate) fn remove_symlink(path: &Path) -> Result<()> {
    let meta = std::fs::symlink_metadata(path)
        .with_context(|| format!("reading metadata: {}", path.display()))?;
    if is_dir_like(&meta) {
        match std::fs::remove_dir(path) {
            Ok(()) => {}
            #[cfg(windows)]
            Err(e) if e.raw_os_error() == Some(5) => {
                remove_dir_fallback(path)?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("removing link: {}", path.display()));
            }
        }
    } else {
        std::fs::remove_file(path).with_context(|| format!("removing link: {}", path.display()))?;
    }
    Ok(())
}

/// Check if metadata represents a directory-like entry.
/// On Windows, `symlink_metadata().is_dir()` returns `false` for directory symlinks,
/// so we check the raw `FILE_ATTRIBUTE_DIRECTORY` bit instead.
fn is_dir_like(meta: &std::fs::Metadata) -> bool {
    #[cfg(windows)]
    {
        use std::os::windows::fs::MetadataExt;
        meta.file_attributes() & 0x10 != 0 // FILE_ATTRIBUTE_DIRECTORY
    }
    #[cfg(not(windows))]
    {
        meta.is_dir()
    }
}

/// Fallback directory removal on Windows using `cmd /c rmdir`.
#[cfg(windows)]
fn remove_dir_fallback(path: &Path) -> Result<()> {
    const CREATE_NO_WINDOW: u32 = 0x0800_0000;
    use std::os::windows::process::CommandExt;
    let output = std::process::Command::new("cmd")
        .arg("/c")
        .arg("rmdir")
        .arg("/q")
        .arg(path)
        .creation_flags(CREATE_NO_WINDOW)
        .output()
        .context("failed to run rmdir")?;
    if !output.status.success() {
        anyhow::bail!(
            "remove directory/symlink '{}': {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn paths_equal_works() {
        assert!(paths_equal(Path::new("/tmp/test"), Path::new("/tmp/test")));
        assert!(!paths_equal(Path::new("/tmp/test"), Path::new("/tmp/other")));
    }

    #[test]
    fn symlink_resource_invalid_when_source_missing() {
        let temp_dir = tempfile::tempdir().unwrap();
        let resource = SymlinkResource::new(
            temp_dir.path().join("nonexistent"),
            temp_dir.path().join("target"),
        );
        let state = resource.current_state().unwrap();
        assert!(matches!(state, ResourceState::Invalid { .. }));
    }

    #[test]
    fn symlink_resource_missing_when_target_not_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("source");
        std::fs::write(&source, "test").unwrap();

        let resource = SymlinkResource::new(source, temp_dir.path().join("target"));
        assert_eq!(resource.current_state().unwrap(), ResourceState::Missing);
    }

    #[test]
    fn symlink_resource_incorrect_when_target_is_regular_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        std::fs::write(&source, "content").unwrap();
        std::fs::write(&target, "other content").unwrap();

        let resource = SymlinkResource::new(source, target);
        assert_eq!(
            resource.current_state().unwrap(),
            ResourceState::Incorrect {
                current: "target is a regular file".to_string()
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn apply_then_remove() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        std::fs::write(&source, "test").unwrap();
        let resource = SymlinkResource::new(source.clone(), target.clone());

        assert_eq!(resource.apply().unwrap(), ResourceChange::Applied);
        assert_eq!(std::fs::read_link(&target).unwrap(), source);
        assert_eq!(resource.current_state().unwrap(), ResourceState::Correct);
        assert_eq!(resource.apply().unwrap(), ResourceChange::AlreadyCorrect);

        assert_eq!(resource.remove().unwrap(), ResourceChange::Applied);
        assert!(target.symlink_metadata().is_err());
        assert_eq!(resource.remove().unwrap(), ResourceChange::AlreadyCorrect);
    }

    #[cfg(unix)]
    #[test]
    fn apply_fails_when_target_exists() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("source");
        let target = temp_dir.path().join("target");
        std::fs::write(&source, "test").unwrap();
        std::fs::write(&target, "in the way").unwrap();

        let resource = SymlinkResource::new(source, target.clone());
        assert!(resource.apply().is_err());
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "in the way");
    }

    #[cfg(unix)]
    #[test]
    fn remove_leaves_foreign_link_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let source = temp_dir.path().join("source");
        let other = temp_dir.path().join("other");
        let target = temp_dir.path().join("target");
        std::fs::write(&source, "test").unwrap();
        std::fs::write(&other, "other").unwrap();
        std::os::unix::fs::symlink(&other, &target).unwrap();

        let resource = SymlinkResource::new(source, target.clone());
        assert!(matches!(
            resource.current_state().unwrap(),
            ResourceState::Incorrect { .. }
        ));
        assert!(matches!(
            resource.remove().unwrap(),
            ResourceChange::Skipped { .. }
        ));
        assert_eq!(std::fs::read_link(&target).unwrap(), other);
    }

    #[test]
    fn remove_leaves_replaced_file_alone() {
        let temp_dir = tempfile::tempdir().unwrap();
        let target = temp_dir.path().join("target");
        std::fs::write(&target, "user file").unwrap();

        let resource = SymlinkResource::new(temp_dir.path().join("source"), target.clone());
        assert_eq!(
            resource.remove().unwrap(),
            ResourceChange::Skipped {
                reason: "no longer a symlink".to_string()
            }
        );
        assert!(target.exists());
    }
}
