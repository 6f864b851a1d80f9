//! File-system helpers shared by resources and the deployment engine.
use anyhow::{Context as _, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::Occupant;
use crate::resources::symlink::{create_symlink, remove_symlink};

/// What exists at `path`, without following a final symlink.
///
/// # Errors
///
/// Returns any error other than "not found" from reading the metadata, e.g.
/// when an ancestor is a regular file or cannot be searched.
pub fn occupant(path: &Path) -> io::Result<Option<Occupant>> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_symlink() => Ok(Some(Occupant::Symlink)),
        Ok(meta) if meta.is_dir() => Ok(Some(Occupant::Directory)),
        Ok(_) => Ok(Some(Occupant::File)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Ancestors of `path` that do not exist yet, outermost first.
#[must_use]
pub fn missing_ancestors(path: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = path
        .ancestors()
        .skip(1)
        .filter(|p| !p.as_os_str().is_empty())
        .take_while(|p| matches!(fs::symlink_metadata(p), Err(e) if e.kind() == io::ErrorKind::NotFound))
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

/// Ensure the parent directory of `path` exists, creating it (and any
/// ancestors) if necessary.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create parent: {}", parent.display()))?;
    }
    Ok(())
}

/// How [`copy_dir_recursive`] treats the source tree.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyOptions<'a> {
    /// Copy what symlinks point at instead of recreating the links.
    pub follow_symlinks: bool,
    /// File names that are never copied.
    pub skip: &'a [String],
}

/// Recursively copy a directory tree.
///
/// With `follow_symlinks` the content behind every symlink is materialized;
/// otherwise links are recreated as links. Names in `skip` are left out at
/// every level.
///
/// # Errors
///
/// Returns an error if the destination directory cannot be created, a source
/// entry cannot be read, or a file cannot be copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path, options: CopyOptions<'_>) -> Result<()> {
    fs::create_dir_all(dst).with_context(|| format!("creating directory {}", dst.display()))?;
    for entry in fs::read_dir(src).with_context(|| format!("reading directory {}", src.display()))? {
        let entry = entry.with_context(|| format!("reading entry in {}", src.display()))?;
        let name = entry.file_name();
        if options.skip.iter().any(|s| name == s.as_str()) {
            continue;
        }
        let src_path = entry.path();
        let dst_path = dst.join(&name);
        let file_type = entry
            .file_type()
            .with_context(|| format!("reading file type of {}", src_path.display()))?;

        if file_type.is_symlink() && !options.follow_symlinks {
            copy_symlink(&src_path, &dst_path)?;
        } else if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path, options)?;
        } else {
            fs::copy(&src_path, &dst_path).with_context(|| {
                format!("copying {} to {}", src_path.display(), dst_path.display())
            })?;
        }
    }
    Ok(())
}

/// Recreate the symlink at `src` as a new link at `dst` with the same target.
fn copy_symlink(src: &Path, dst: &Path) -> Result<()> {
    let points_to =
        fs::read_link(src).with_context(|| format!("reading link {}", src.display()))?;
    create_symlink(&points_to, dst)
}

/// Remove whatever exists at `path`: a symlink, a file or a whole tree.
///
/// # Errors
///
/// Returns an error if the path cannot be removed.
pub fn remove_path(path: &Path) -> Result<()> {
    match occupant(path).with_context(|| format!("inspecting {}", path.display()))? {
        None => Ok(()),
        Some(Occupant::Symlink) => remove_symlink(path),
        Some(Occupant::Directory) => fs::remove_dir_all(path)
            .with_context(|| format!("removing directory {}", path.display())),
        Some(Occupant::File) => {
            fs::remove_file(path).with_context(|| format!("removing file {}", path.display()))
        }
    }
}

/// Move whatever exists at `from` to `to`, keeping symlinks as links.
///
/// Prefers a rename; falls back to copy + delete when the move crosses a
/// filesystem boundary. `to` must not exist.
///
/// # Errors
///
/// Returns an error if the object cannot be moved.
pub fn move_path(from: &Path, to: &Path) -> Result<()> {
    ensure_parent_dir(to)?;
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            copy_preserving(from, to).inspect_err(|_| {
                let _ = remove_path(to);
            })?;
            remove_path(from)
        }
        Err(e) => Err(e).with_context(|| format!("moving {} to {}", from.display(), to.display())),
    }
}

fn copy_preserving(from: &Path, to: &Path) -> Result<()> {
    match occupant(from).with_context(|| format!("inspecting {}", from.display()))? {
        None => anyhow::bail!("nothing to move at {}", from.display()),
        Some(Occupant::Symlink) => copy_symlink(from, to),
        Some(Occupant::Directory) => copy_dir_recursive(from, to, CopyOptions::default()),
        Some(Occupant::File) => fs::copy(from, to)
            .map(|_| ())
            .with_context(|| format!("copying {} to {}", from.display(), to.display())),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn copies_files_and_subdirectories() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(src.path().join("a.txt"), b"aaa").unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub/b.txt"), b"bbb").unwrap();

        let target = dst.path().join("out");
        copy_dir_recursive(src.path(), &target, CopyOptions::default()).unwrap();

        assert_eq!(fs::read(target.join("a.txt")).unwrap(), b"aaa");
        assert_eq!(fs::read(target.join("sub/b.txt")).unwrap(), b"bbb");
    }

    #[test]
    fn skips_named_files_at_every_level() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();

        fs::write(src.path().join(".dull-linkthis"), b"").unwrap();
        fs::create_dir(src.path().join("sub")).unwrap();
        fs::write(src.path().join("sub/.dull-linkthis"), b"").unwrap();
        fs::write(src.path().join("sub/keep"), b"k").unwrap();

        let skip = vec![".dull-linkthis".to_string()];
        let target = dst.path().join("out");
        let options = CopyOptions {
            follow_symlinks: true,
            skip: &skip,
        };
        copy_dir_recursive(src.path(), &target, options).unwrap();

        assert!(!target.join(".dull-linkthis").exists());
        assert!(!target.join("sub/.dull-linkthis").exists());
        assert!(target.join("sub/keep").exists());
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_followed_or_preserved_on_request() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        fs::write(src.path().join("real"), b"data").unwrap();
        std::os::unix::fs::symlink(src.path().join("real"), src.path().join("link")).unwrap();

        let followed = dst.path().join("followed");
        let options = CopyOptions {
            follow_symlinks: true,
            skip: &[],
        };
        copy_dir_recursive(src.path(), &followed, options).unwrap();
        assert!(!followed.join("link").symlink_metadata().unwrap().is_symlink());
        assert_eq!(fs::read(followed.join("link")).unwrap(), b"data");

        let preserved = dst.path().join("preserved");
        copy_dir_recursive(src.path(), &preserved, CopyOptions::default()).unwrap();
        assert!(preserved.join("link").symlink_metadata().unwrap().is_symlink());
    }

    #[test]
    fn occupant_reports_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert_eq!(occupant(&file).unwrap(), Some(Occupant::File));
        assert_eq!(occupant(tmp.path()).unwrap(), Some(Occupant::Directory));
        assert_eq!(occupant(&tmp.path().join("none")).unwrap(), None);
    }

    #[cfg(unix)]
    #[test]
    fn occupant_errors_when_ancestor_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, b"x").unwrap();
        assert!(occupant(&file.join("child")).is_err());
    }

    #[test]
    fn missing_ancestors_outermost_first() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("a/b/c/file");
        assert_eq!(
            missing_ancestors(&target),
            vec![
                tmp.path().join("a"),
                tmp.path().join("a/b"),
                tmp.path().join("a/b/c"),
            ]
        );
        assert!(missing_ancestors(&tmp.path().join("file")).is_empty());
    }

    #[test]
    fn move_path_moves_trees() {
        let tmp = tempfile::tempdir().unwrap();
        let from = tmp.path().join("dir");
        fs::create_dir(&from).unwrap();
        fs::write(from.join("inner"), b"i").unwrap();
        let to = tmp.path().join("backup/0000-dir");

        move_path(&from, &to).unwrap();
        assert!(!from.exists());
        assert_eq!(fs::read(to.join("inner")).unwrap(), b"i");
    }

    #[test]
    fn remove_path_handles_every_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        fs::create_dir_all(dir.join("nested")).unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, b"x").unwrap();

        remove_path(&dir).unwrap();
        remove_path(&file).unwrap();
        remove_path(&tmp.path().join("absent")).unwrap();
        assert!(!dir.exists());
        assert!(!file.exists());
    }
}
