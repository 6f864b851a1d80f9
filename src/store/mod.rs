//! On-disk build store.
//!
//! # Storage Layout
//!
//! ```text
//! <store>/
//! ├── builds/<id>.json        # one immutable Build per file
//! ├── deployments/<id>.json   # current DeploymentRecord of build <id>
//! └── backups/<id>/           # objects displaced by forced deploys
//! ```
//!
//! Every write goes to a `.tmp` sibling first and is renamed into place.
mod records;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::build::{BUILD_FORMAT_VERSION, Build, BuildDraft, BuildId};
use crate::error::StoreError;

const BUILDS_DIR: &str = "builds";
const DEPLOYMENTS_DIR: &str = "deployments";
const BACKUPS_DIR: &str = "backups";

/// Chronological listing of stored build identifiers.
///
/// Only file names are read when the listing is taken, so the order is
/// known; builds are loaded on demand with [`BuildStore::get`]. Clone the
/// value to iterate it again from the start.
#[derive(Debug, Clone)]
pub struct BuildIds {
    ids: std::vec::IntoIter<BuildId>,
}

impl Iterator for BuildIds {
    type Item = BuildId;

    fn next(&mut self) -> Option<Self::Item> {
        self.ids.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.ids.size_hint()
    }
}

impl DoubleEndedIterator for BuildIds {
    fn next_back(&mut self) -> Option<Self::Item> {
        self.ids.next_back()
    }
}

impl ExactSizeIterator for BuildIds {}

/// Append-only catalog of builds plus the current deployment records.
#[derive(Debug, Clone)]
pub struct BuildStore {
    root: PathBuf,
}

impl BuildStore {
    /// Create a store rooted at `root`. Nothing is created until the first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn build_path(&self, id: &BuildId) -> PathBuf {
        self.root.join(BUILDS_DIR).join(format!("{id}.json"))
    }

    /// Persist a draft under a fresh identifier.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the store cannot be listed or written, or
    /// [`StoreError::SequenceExhausted`] if the last build used the highest
    /// sequence number.
    pub fn save(&self, draft: BuildDraft) -> Result<Build, StoreError> {
        let next = match self.list()?.next_back() {
            None => 1,
            Some(last) => last
                .sequence()
                .checked_add(1)
                .ok_or_else(|| StoreError::SequenceExhausted(last.to_string()))?,
        };
        let created_at = chrono::Utc::now();
        let build = Build::from_draft(draft, BuildId::new(next, created_at), created_at);
        write_json(&self.build_path(&build.id), &build)?;
        Ok(build)
    }

    /// Load the build with identifier `id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no such build exists, or another
    /// [`StoreError`] if the file cannot be read or parsed.
    pub fn get(&self, id: &BuildId) -> Result<Build, StoreError> {
        let path = self.build_path(id);
        let build: Build =
            read_json(&path)?.ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if build.version != BUILD_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path,
                version: build.version,
            });
        }
        Ok(build)
    }

    /// Load the most recently saved build.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the store holds no builds.
    pub fn latest(&self) -> Result<Build, StoreError> {
        let id = self
            .list()?
            .next_back()
            .ok_or_else(|| StoreError::NotFound("no builds in store".to_string()))?;
        self.get(&id)
    }

    /// List stored build identifiers, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Read`] if the builds directory cannot be read.
    pub fn list(&self) -> Result<BuildIds, StoreError> {
        let dir = self.root.join(BUILDS_DIR);
        let read_err = |source| StoreError::Read {
            path: dir.clone(),
            source,
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(BuildIds {
                    ids: Vec::new().into_iter(),
                });
            }
            Err(e) => return Err(read_err(e)),
        };

        let mut ids = Vec::new();
        for entry in entries {
            let name = entry.map_err(read_err)?.file_name();
            if let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(BuildId::parse)
            {
                ids.push(id);
            }
        }
        ids.sort();
        Ok(BuildIds {
            ids: ids.into_iter(),
        })
    }

    /// Map a selector to a stored build identifier.
    ///
    /// A selector is a full identifier, a bare sequence number, or a build
    /// label (the most recent build carrying it wins).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when nothing matches.
    pub fn resolve(&self, selector: &str) -> Result<BuildId, StoreError> {
        let not_found = || StoreError::NotFound(selector.to_string());

        if let Some(id) = BuildId::parse(selector) {
            return if self.build_path(&id).is_file() {
                Ok(id)
            } else {
                Err(not_found())
            };
        }

        if !selector.is_empty() && selector.bytes().all(|b| b.is_ascii_digit()) {
            let sequence: u32 = selector.parse().map_err(|_| not_found())?;
            return self
                .list()?
                .find(|id| id.sequence() == sequence)
                .ok_or_else(not_found);
        }

        for id in self.list()?.rev() {
            if self.get(&id)?.label.as_deref() == Some(selector) {
                return Ok(id);
            }
        }
        Err(not_found())
    }

    /// Load the build named by `selector`, or the latest build when `None`.
    ///
    /// # Errors
    ///
    /// See [`resolve`](Self::resolve) and [`get`](Self::get).
    pub fn select(&self, selector: Option<&str>) -> Result<Build, StoreError> {
        match selector {
            Some(selector) => self.get(&self.resolve(selector)?),
            None => self.latest(),
        }
    }
}

/// Serialize `value` to `path` atomically, creating parent directories.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let temp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(value).map_err(StoreError::Serialize)?;
    fs::write(&temp_path, content).map_err(|source| StoreError::Write {
        path: temp_path.clone(),
        source,
    })?;
    fs::rename(&temp_path, path).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Read and parse `path`, returning `None` if it does not exist.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::build::{EntryKind, LinkEntry};
    use tempfile::TempDir;

    fn temp_store() -> (BuildStore, TempDir) {
        let tmp = TempDir::new().unwrap();
        let store = BuildStore::new(tmp.path().join("store"));
        (store, tmp)
    }

    fn draft(label: Option<&str>) -> BuildDraft {
        BuildDraft {
            label: label.map(String::from),
            entries: vec![LinkEntry {
                target: PathBuf::from("/out/a"),
                source: PathBuf::from("/m/a"),
                kind: EntryKind::File,
                module: 0,
            }],
            ..BuildDraft::default()
        }
    }

    #[test]
    fn empty_store_lists_nothing() {
        let (store, _tmp) = temp_store();
        assert_eq!(store.list().unwrap().count(), 0);
        assert!(matches!(store.latest(), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn save_then_get() {
        let (store, _tmp) = temp_store();
        let saved = store.save(draft(None)).unwrap();
        assert_eq!(saved.id.sequence(), 1);
        assert_eq!(store.get(&saved.id).unwrap(), saved);
        assert!(store.root().join("builds").join(format!("{}.json", saved.id)).is_file());
    }

    #[test]
    fn save_allocates_increasing_ids_and_latest_follows() {
        let (store, _tmp) = temp_store();
        let first = store.save(draft(None)).unwrap();
        let second = store.save(draft(None)).unwrap();
        assert!(first.id < second.id);
        assert_eq!(store.latest().unwrap().id, second.id);
        // Earlier builds are untouched.
        assert_eq!(store.get(&first.id).unwrap(), first);
    }

    #[test]
    fn list_is_chronological_and_restartable() {
        let (store, _tmp) = temp_store();
        for _ in 0..3 {
            store.save(draft(None)).unwrap();
        }
        let ids = store.list().unwrap();
        let again = ids.clone();
        let seqs: Vec<u32> = ids.map(|id| id.sequence()).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(again.count(), 3);
    }

    #[test]
    fn list_ignores_temp_and_foreign_files() {
        let (store, _tmp) = temp_store();
        store.save(draft(None)).unwrap();
        let dir = store.root().join("builds");
        fs::write(dir.join("notes.txt"), "x").unwrap();
        fs::write(dir.join("000009-20260101T000000Z.json.tmp"), "{").unwrap();
        assert_eq!(store.list().unwrap().count(), 1);
    }

    #[test]
    fn save_refuses_to_wrap_the_sequence() {
        let (store, _tmp) = temp_store();
        let dir = store.root().join("builds");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(format!("{}-20260101T000000Z.json", u32::MAX)), "{}").unwrap();
        assert!(matches!(
            store.save(draft(None)),
            Err(StoreError::SequenceExhausted(_))
        ));
        assert_eq!(store.list().unwrap().count(), 1);
    }

    #[test]
    fn get_missing_is_not_found() {
        let (store, _tmp) = temp_store();
        let id = BuildId::parse("000001-20260101T000000Z").unwrap();
        assert!(matches!(store.get(&id), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn corrupt_build_is_parse_error_naming_file() {
        let (store, _tmp) = temp_store();
        let saved = store.save(draft(None)).unwrap();
        let path = store.build_path(&saved.id);
        fs::write(&path, "{ not json").unwrap();
        let err = store.get(&saved.id).unwrap_err();
        assert!(matches!(&err, StoreError::Parse { path: p, .. } if *p == path));
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let (store, _tmp) = temp_store();
        let mut saved = store.save(draft(None)).unwrap();
        saved.version = 99;
        write_json(&store.build_path(&saved.id), &saved).unwrap();
        assert!(matches!(
            store.get(&saved.id),
            Err(StoreError::UnsupportedVersion { version: 99, .. })
        ));
    }

    #[test]
    fn resolve_accepts_id_sequence_and_label() {
        let (store, _tmp) = temp_store();
        let a = store.save(draft(Some("laptop"))).unwrap();
        let b = store.save(draft(None)).unwrap();
        let c = store.save(draft(Some("laptop"))).unwrap();

        assert_eq!(store.resolve(a.id.as_str()).unwrap(), a.id);
        assert_eq!(store.resolve("2").unwrap(), b.id);
        assert_eq!(store.resolve("laptop").unwrap(), c.id);
        assert!(matches!(store.resolve("desktop"), Err(StoreError::NotFound(_))));
        assert!(matches!(store.resolve("17"), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn select_defaults_to_latest() {
        let (store, _tmp) = temp_store();
        store.save(draft(None)).unwrap();
        let last = store.save(draft(None)).unwrap();
        assert_eq!(store.select(None).unwrap().id, last.id);
        assert_eq!(store.select(Some("1")).unwrap().id.sequence(), 1);
    }
}
