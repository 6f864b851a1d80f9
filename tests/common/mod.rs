// Shared helpers for integration tests.
//
// Provides a temporary-directory-backed dotfile repository (config file,
// module sources, target area and build store) and a fluent builder so each
// integration test can set up an isolated environment without repeating
// filesystem boilerplate.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use dull_cli::build::{Build, BuildMeta, Builder};
use dull_cli::config::Config;
use dull_cli::directives::{DEFAULT_LINKTHESE_FILE, DEFAULT_LINKTHIS_FILE};
use dull_cli::error::DullError;
use dull_cli::logging::Log;
use dull_cli::store::BuildStore;

/// A [`Log`] that keeps every message in memory.
#[derive(Debug, Default)]
pub struct RecordingLog {
    messages: Mutex<Vec<(&'static str, String)>>,
}

impl RecordingLog {
    fn push(&self, level: &'static str, msg: &str) {
        self.messages
            .lock()
            .expect("log mutex")
            .push((level, msg.to_string()));
    }

    /// Messages logged at `level` ("warn", "info", ...).
    pub fn at(&self, level: &str) -> Vec<String> {
        self.messages
            .lock()
            .expect("log mutex")
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Log for RecordingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry_run", msg);
    }
}

/// Which marker file to drop into a module directory.
#[derive(Debug, Clone, Copy)]
pub enum Marker {
    LinkThis,
    LinkThese,
}

/// An isolated test repository backed by a [`tempfile::TempDir`].
///
/// Layout:
/// - `dull.toml`  the module list
/// - `modules/`   module sources
/// - `out/`       parent of every module target (not created up front)
/// - `.dull/`     the build store
pub struct IntegrationTestContext {
    /// Temporary directory containing the test repository.
    pub root: tempfile::TempDir,
}

impl IntegrationTestContext {
    /// Path to the repository root.
    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.root.path().join("dull.toml")
    }

    /// Absolute path of `rel` under the target area.
    pub fn out(&self, rel: &str) -> PathBuf {
        self.root.path().join("out").join(rel)
    }

    /// Absolute path of `rel` under the module sources.
    pub fn module_path(&self, rel: &str) -> PathBuf {
        self.root.path().join("modules").join(rel)
    }

    /// Load the config file.
    pub fn load_config(&self) -> Config {
        Config::load(&self.config_path()).expect("load config")
    }

    /// The build store named by the config file.
    pub fn store(&self) -> BuildStore {
        BuildStore::new(self.load_config().store)
    }

    /// Run a build with `label`.
    pub fn try_build(&self, label: Option<&str>, log: &dyn Log) -> Result<Build, DullError> {
        let config = self.load_config();
        let meta = BuildMeta {
            label: label.map(str::to_string),
            config: Some(config.path.clone()),
        };
        Builder::new(&config.modules, &config.markers).build(
            &BuildStore::new(&config.store),
            meta,
            log,
        )
    }

    /// Run a build that must succeed.
    pub fn build(&self) -> Build {
        self.try_build(None, &RecordingLog::default())
            .expect("build succeeds")
    }
}

/// Fluent builder for [`IntegrationTestContext`].
///
/// Modules are appended to `dull.toml` in the order they are added.
pub struct TestContextBuilder {
    ctx: IntegrationTestContext,
    config: String,
}

impl TestContextBuilder {
    /// Begin building an empty repository.
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create temp dir");
        std::fs::create_dir(root.path().join("modules")).expect("create modules dir");
        Self {
            ctx: IntegrationTestContext { root },
            config: String::new(),
        }
    }

    /// Declare module `modules/<name>` deployed to `out/<target>`, with
    /// optional config directives.
    pub fn with_module_directives(
        mut self,
        name: &str,
        target: &str,
        linkthis: &[&str],
        linkthese: &[&str],
    ) -> Self {
        let source = self.ctx.module_path(name);
        std::fs::create_dir_all(&source).expect("create module dir");
        let target = self.ctx.out(target);
        let list = |items: &[&str]| {
            items
                .iter()
                .map(|i| format!("'{i}'"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let _ = write!(
            self.config,
            "[[module]]\nsource = 'modules/{name}'\ntarget = '{}'\nlinkthis = [{}]\nlinkthese = [{}]\n\n",
            target.display(),
            list(linkthis),
            list(linkthese),
        );
        self
    }

    /// Declare module `modules/<name>` deployed to `out/<target>`.
    pub fn with_module(self, name: &str, target: &str) -> Self {
        self.with_module_directives(name, target, &[], &[])
    }

    /// Write `content` to `modules/<rel>`, creating parent directories.
    pub fn with_file(self, rel: &str, content: &str) -> Self {
        let path = self.ctx.module_path(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create source parent");
        }
        std::fs::write(&path, content).expect("write source file");
        self
    }

    /// Drop a marker file into the directory `modules/<dir>`.
    pub fn with_marker(self, dir: &str, marker: Marker) -> Self {
        let name = match marker {
            Marker::LinkThis => DEFAULT_LINKTHIS_FILE,
            Marker::LinkThese => DEFAULT_LINKTHESE_FILE,
        };
        self.with_file(&format!("{dir}/{name}"), "")
    }

    /// Write `content` to `out/<rel>`, simulating a file the user already has.
    pub fn with_existing_target(self, rel: &str, content: &str) -> Self {
        let path = self.ctx.out(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create target parent");
        }
        std::fs::write(&path, content).expect("write existing target");
        self
    }

    /// Write the config file and return the finished context.
    pub fn build(self) -> IntegrationTestContext {
        std::fs::write(self.ctx.config_path(), &self.config).expect("write dull.toml");
        self.ctx
    }
}
