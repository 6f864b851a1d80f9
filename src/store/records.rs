//! Deployment record persistence.
use std::fs;
use std::io;
use std::path::PathBuf;

use super::{BACKUPS_DIR, BuildStore, DEPLOYMENTS_DIR, read_json, write_json};
use crate::build::BuildId;
use crate::deploy::{DeploymentRecord, RECORD_FORMAT_VERSION};
use crate::error::StoreError;

impl BuildStore {
    fn record_path(&self, id: &BuildId) -> PathBuf {
        self.root.join(DEPLOYMENTS_DIR).join(format!("{id}.json"))
    }

    /// A fresh directory path for objects displaced while deploying `id`.
    ///
    /// The directory is not created here.
    #[must_use]
    pub fn new_backup_dir(&self, id: &BuildId) -> PathBuf {
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6fZ");
        self.root
            .join(BACKUPS_DIR)
            .join(id.as_str())
            .join(stamp.to_string())
    }

    /// Persist `record` as the current deployment of its build.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the record cannot be written.
    pub fn save_record(&self, record: &DeploymentRecord) -> Result<(), StoreError> {
        write_json(&self.record_path(&record.build), record)
    }

    /// Load the current deployment record of build `id`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the record exists but cannot be read.
    pub fn load_record(&self, id: &BuildId) -> Result<Option<DeploymentRecord>, StoreError> {
        let path = self.record_path(id);
        let Some(record) = read_json::<DeploymentRecord>(&path)? else {
            return Ok(None);
        };
        if record.version != RECORD_FORMAT_VERSION {
            return Err(StoreError::UnsupportedVersion {
                path,
                version: record.version,
            });
        }
        Ok(Some(record))
    }

    /// Delete the deployment record of build `id`. Missing records are fine.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the file exists but cannot be removed.
    pub fn remove_record(&self, id: &BuildId) -> Result<(), StoreError> {
        let path = self.record_path(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Write { path, source }),
        }
    }

    /// All deployment records, oldest deployment first.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the deployments directory or a record
    /// cannot be read.
    pub fn records(&self) -> Result<Vec<DeploymentRecord>, StoreError> {
        let dir = self.root.join(DEPLOYMENTS_DIR);
        let read_err = |source| StoreError::Read {
            path: dir.clone(),
            source,
        };
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(read_err(e)),
        };

        let mut records = Vec::new();
        for entry in entries {
            let name = entry.map_err(read_err)?.file_name();
            let Some(id) = name
                .to_str()
                .and_then(|n| n.strip_suffix(".json"))
                .and_then(BuildId::parse)
            else {
                continue;
            };
            if let Some(record) = self.load_record(&id)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.deployed_at.cmp(&b.deployed_at).then_with(|| a.build.cmp(&b.build)));
        Ok(records)
    }

    /// The most recently deployed build's record, if any build is deployed.
    ///
    /// # Errors
    ///
    /// See [`records`](Self::records).
    pub fn latest_record(&self) -> Result<Option<DeploymentRecord>, StoreError> {
        Ok(self.records()?.pop())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::deploy::{Action, DeployMode};
    use chrono::{Duration, Utc};
    use tempfile::TempDir;

    fn record(seq: &str, minutes_ago: i64) -> DeploymentRecord {
        DeploymentRecord {
            version: RECORD_FORMAT_VERSION,
            build: BuildId::parse(&format!("{seq}-20260101T000000Z")).unwrap(),
            mode: DeployMode::Symlink,
            deployed_at: Utc::now() - Duration::minutes(minutes_ago),
            backup_dir: PathBuf::from("/b"),
            actions: vec![Action::CreateDir {
                path: PathBuf::from("/out"),
            }],
        }
    }

    #[test]
    fn record_round_trip_and_remove() {
        let tmp = TempDir::new().unwrap();
        let store = BuildStore::new(tmp.path());
        let rec = record("000001", 0);

        assert_eq!(store.load_record(&rec.build).unwrap(), None);
        store.save_record(&rec).unwrap();
        assert_eq!(store.load_record(&rec.build).unwrap(), Some(rec.clone()));

        store.remove_record(&rec.build).unwrap();
        assert_eq!(store.load_record(&rec.build).unwrap(), None);
        // Removing again is not an error.
        store.remove_record(&rec.build).unwrap();
    }

    #[test]
    fn latest_record_is_most_recently_deployed() {
        let tmp = TempDir::new().unwrap();
        let store = BuildStore::new(tmp.path());
        assert!(store.latest_record().unwrap().is_none());

        store.save_record(&record("000002", 30)).unwrap();
        store.save_record(&record("000001", 5)).unwrap();

        let latest = store.latest_record().unwrap().unwrap();
        assert_eq!(latest.build.sequence(), 1);
        assert_eq!(store.records().unwrap().len(), 2);
    }

    #[test]
    fn backup_dirs_live_under_the_build() {
        let tmp = TempDir::new().unwrap();
        let store = BuildStore::new(tmp.path());
        let id = BuildId::parse("000003-20260101T000000Z").unwrap();
        let dir = store.new_backup_dir(&id);
        assert!(dir.starts_with(tmp.path().join("backups").join(id.as_str())));
        assert!(!dir.exists());
    }
}
