// src/dedup/file.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::{fs, sync::Mutex};

use super::store::{apply_upsert, DedupStore, StoredRecord};
use super::DedupState;
use crate::error::StoreError;

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    records: BTreeMap<String, StoredRecord>,
}

/// JSON document on disk holding every key.
///
/// A missing file reads as "no records". An unreadable or corrupt file is an
/// error, never an empty store. Writes go to a sibling temp file and are
/// renamed over the target, so the document is either old or new on disk.
///
/// The version check in `upsert_if` is atomic against other tasks in this
/// process only. There is no OS-level lock: two processes sharing one file
/// can still interleave between check and rename.
pub struct FileStore {
    path: PathBuf,
    // serialises read-modify-write within this process
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Document, StoreError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Document::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, doc: &Document) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    async fn write_record(
        &self,
        key: &str,
        state: DedupState,
        expected: Option<Option<u64>>,
    ) -> Result<u64, StoreError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let version = apply_upsert(&mut doc.records, key, state, expected)?;
        self.save(&doc).await?;
        tracing::debug!(target: "dedup", key, version, path = %self.path.display(), "state written");
        Ok(version)
    }
}

#[async_trait::async_trait]
impl DedupStore for FileStore {
    async fn read(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.records.remove(key))
    }

    async fn upsert(&self, key: &str, state: DedupState) -> Result<u64, StoreError> {
        self.write_record(key, state, None).await
    }

    async fn upsert_if(
        &self,
        key: &str,
        state: DedupState,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        self.write_record(key, state, Some(expected)).await
    }
}
