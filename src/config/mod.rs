//! Configuration: the TOML module list and its `[global]` settings.
pub mod modules;
pub mod toml_loader;
pub mod validation;

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::build::Module;
use crate::directives::{DEFAULT_LINKTHESE_FILE, DEFAULT_LINKTHIS_FILE, Markers};
use crate::error::ConfigError;
use modules::ModuleConfig;

/// Config file looked up in the current directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "dull.toml";

/// Store directory, relative to the config file, when `[global] store` is absent.
pub const DEFAULT_STORE_DIR: &str = ".dull";

/// The optional `[global]` table.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct GlobalConfig {
    /// Marker file name for [`crate::directives::Directive::LinkThis`].
    pub linkthis_file: Option<String>,
    /// Marker file name for [`crate::directives::Directive::LinkThese`].
    pub linkthese_file: Option<String>,
    /// Build store directory.
    pub store: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    global: GlobalConfig,
    #[serde(default, rename = "module")]
    modules: Vec<ModuleConfig>,
}

/// A loaded, resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// The config file.
    pub path: PathBuf,
    /// Directory relative paths are resolved against.
    pub root: PathBuf,
    /// Marker file names.
    pub markers: Markers,
    /// Build store directory.
    pub store: PathBuf,
    /// Modules in declaration order.
    pub modules: Vec<Module>,
}

impl Config {
    /// Load and resolve the config file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is missing or malformed, or a
    /// module definition is unusable.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml_loader::load_config(path)?;
        let path = dunce::canonicalize(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root = path.parent().map_or_else(PathBuf::new, Path::to_path_buf);
        Self::from_raw(raw, path, root, modules::home_dir().as_deref())
    }

    fn from_raw(
        raw: RawConfig,
        path: PathBuf,
        root: PathBuf,
        home: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let markers = Markers {
            linkthis: raw
                .global
                .linkthis_file
                .unwrap_or_else(|| DEFAULT_LINKTHIS_FILE.to_string()),
            linkthese: raw
                .global
                .linkthese_file
                .unwrap_or_else(|| DEFAULT_LINKTHESE_FILE.to_string()),
        };
        check_markers(&path, &markers)?;

        let store_raw = raw.global.store.as_deref().unwrap_or(DEFAULT_STORE_DIR);
        let store = modules::expand_home(store_raw, home).ok_or_else(|| ConfigError::Parse {
            path: path.clone(),
            message: format!("cannot expand `~` in store path {store_raw}: home directory unknown"),
        })?;
        let store = root.join(store);

        let modules = raw
            .modules
            .iter()
            .map(|m| m.resolve(&root, home))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            path,
            root,
            markers,
            store,
            modules,
        })
    }
}

fn check_markers(path: &Path, markers: &Markers) -> Result<(), ConfigError> {
    let parse_error = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };
    for name in [&markers.linkthis, &markers.linkthese] {
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(parse_error(format!("invalid marker file name {name:?}")));
        }
    }
    if markers.linkthis == markers.linkthese {
        return Err(parse_error(
            "linkthis_file and linkthese_file must differ".into(),
        ));
    }
    Ok(())
}
