//! Module definitions: the `[[module]]` tables of the config file.
use serde::Deserialize;
use std::path::{Component, Path, PathBuf};

use crate::build::Module;
use crate::directives::Directive;
use crate::error::ConfigError;

/// A `[[module]]` table as written in the config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Module directory, relative to the config file's directory or absolute.
    pub source: String,
    /// Where the module's tree is deployed; `~` expands to the home directory.
    pub target: String,
    /// Directories (relative to `source`) linked as single units.
    #[serde(default)]
    pub linkthis: Vec<PathBuf>,
    /// Directories (relative to `source`) whose children are linked as units.
    #[serde(default)]
    pub linkthese: Vec<PathBuf>,
}

impl ModuleConfig {
    /// Resolve paths against `root` and `home` into a [`Module`].
    ///
    /// # Errors
    ///
    /// - [`ConfigError::InvalidModule`] if the source is not a readable
    ///   directory or the target is not absolute after expansion.
    /// - [`ConfigError::ConflictingDirectives`] if a path is listed under
    ///   both `linkthis` and `linkthese`.
    pub fn resolve(&self, root: &Path, home: Option<&Path>) -> Result<Module, ConfigError> {
        let invalid = |reason: String| ConfigError::InvalidModule {
            module: self.source.clone(),
            reason,
        };

        let source = expand_home(&self.source, home)
            .ok_or_else(|| invalid("cannot expand `~`: home directory unknown".into()))?;
        let source = root.join(source);
        let source = dunce::canonicalize(&source)
            .map_err(|e| invalid(format!("cannot read source {}: {e}", source.display())))?;
        if !source.is_dir() {
            return Err(invalid(format!(
                "source {} is not a directory",
                source.display()
            )));
        }

        let target = expand_home(&self.target, home)
            .ok_or_else(|| invalid("cannot expand `~`: home directory unknown".into()))?;
        if !target.is_absolute() {
            return Err(invalid(format!(
                "target {} must be an absolute path",
                target.display()
            )));
        }

        let mut module = Module::new(source, clean_absolute(&target));
        let these: Vec<PathBuf> = self.linkthese.iter().map(|p| normalize(p)).collect();
        for raw in &self.linkthis {
            let rel = normalize(raw);
            if these.contains(&rel) {
                return Err(ConfigError::ConflictingDirectives {
                    path: module.source.join(rel),
                });
            }
            module = module.with_directive(rel, Directive::LinkThis);
        }
        for rel in these {
            module = module.with_directive(rel, Directive::LinkThese);
        }
        Ok(module)
    }
}

/// Drop `.` components so `.` and `""` both name the module root.
fn normalize(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Resolve `.` and `..` components of an absolute path without touching the
/// filesystem. `..` at the root stays at the root.
fn clean_absolute(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Expand a leading `~` to `home`. Returns `None` when `raw` needs a home
/// directory and none is known.
#[must_use]
pub fn expand_home(raw: &str, home: Option<&Path>) -> Option<PathBuf> {
    let Some(rest) = raw.strip_prefix('~') else {
        return Some(PathBuf::from(raw));
    };
    if !(rest.is_empty() || rest.starts_with('/') || rest.starts_with('\\')) {
        // `~user` forms are taken literally.
        return Some(PathBuf::from(raw));
    }
    let rest = rest.trim_start_matches(['/', '\\']);
    home.map(|h| if rest.is_empty() { h.to_path_buf() } else { h.join(rest) })
}

/// The user's home directory from `HOME` (`USERPROFILE` on Windows).
#[must_use]
pub fn home_dir() -> Option<PathBuf> {
    let var = if cfg!(windows) { "USERPROFILE" } else { "HOME" };
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use std::fs;

    fn module_config(source: &str, target: &str) -> ModuleConfig {
        ModuleConfig {
            source: source.into(),
            target: target.into(),
            linkthis: Vec::new(),
            linkthese: Vec::new(),
        }
    }

    #[test]
    fn expand_home_variants() {
        let home = Path::new("/home/u");
        assert_eq!(expand_home("~", Some(home)), Some(PathBuf::from("/home/u")));
        assert_eq!(
            expand_home("~/.config/nvim", Some(home)),
            Some(PathBuf::from("/home/u/.config/nvim"))
        );
        assert_eq!(expand_home("/abs", None), Some(PathBuf::from("/abs")));
        assert_eq!(expand_home("~other/x", None), Some(PathBuf::from("~other/x")));
        assert_eq!(expand_home("~/x", None), None);
    }

    #[cfg(unix)]
    #[test]
    fn target_dot_dot_components_are_resolved() {
        assert_eq!(
            clean_absolute(Path::new("/out/a/../b/./c")),
            PathBuf::from("/out/b/c")
        );
        assert_eq!(clean_absolute(Path::new("/../x")), PathBuf::from("/x"));

        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("m")).unwrap();
        let module = module_config("m", "/out/a/../b")
            .resolve(root.path(), None)
            .unwrap();
        assert_eq!(module.target, PathBuf::from("/out/b"));
    }

    #[test]
    fn resolve_joins_source_to_root_and_expands_target() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir_all(root.path().join("modules/nvim")).unwrap();
        let home = root.path().join("home");

        let module = module_config("modules/nvim", "~/.config/nvim")
            .resolve(root.path(), Some(&home))
            .unwrap();
        assert_eq!(
            module.source,
            dunce::canonicalize(root.path().join("modules/nvim")).unwrap()
        );
        assert_eq!(module.target, home.join(".config/nvim"));
    }

    #[test]
    fn resolve_rejects_missing_source() {
        let root = tempfile::tempdir().unwrap();
        let err = module_config("nope", "/out")
            .resolve(root.path(), None)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidModule { ref module, .. } if module == "nope"));
    }

    #[test]
    fn resolve_rejects_file_source() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("file"), "").unwrap();
        let err = module_config("file", "/out")
            .resolve(root.path(), None)
            .unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn resolve_rejects_relative_target() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("m")).unwrap();
        let err = module_config("m", "relative/out")
            .resolve(root.path(), None)
            .unwrap_err();
        assert!(err.to_string().contains("must be an absolute path"));
    }

    #[test]
    fn resolve_maps_dot_to_module_root() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("m")).unwrap();
        let mut config = module_config("m", "/out");
        config.linkthese = vec![PathBuf::from(".")];
        config.linkthis = vec![PathBuf::from("./lua/plugins")];

        let module = config.resolve(root.path(), None).unwrap();
        assert_eq!(
            module.directives.get(Path::new("")),
            Some(&Directive::LinkThese)
        );
        assert_eq!(
            module.directives.get(Path::new("lua/plugins")),
            Some(&Directive::LinkThis)
        );
    }

    #[test]
    fn resolve_rejects_path_in_both_lists() {
        let root = tempfile::tempdir().unwrap();
        fs::create_dir(root.path().join("m")).unwrap();
        let mut config = module_config("m", "/out");
        config.linkthis = vec![PathBuf::from("lua")];
        config.linkthese = vec![PathBuf::from("./lua")];

        let err = config.resolve(root.path(), None).unwrap_err();
        assert!(matches!(err, ConfigError::ConflictingDirectives { ref path } if path.ends_with("lua")));
    }
}
