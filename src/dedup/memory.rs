// src/dedup/memory.rs
use std::collections::BTreeMap;
use tokio::sync::Mutex;

use super::store::{apply_upsert, DedupStore, StoredRecord};
use super::DedupState;
use crate::error::StoreError;

/// Process-local store for dry runs and tests. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<String, StoredRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with `state` under `key` (version 1).
    pub fn seeded(key: &str, state: DedupState) -> Self {
        let mut records = BTreeMap::new();
        // Fresh map, no conflict possible.
        let _ = apply_upsert(&mut records, key, state, None);
        Self {
            records: Mutex::new(records),
        }
    }
}

#[async_trait::async_trait]
impl DedupStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<StoredRecord>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn upsert(&self, key: &str, state: DedupState) -> Result<u64, StoreError> {
        apply_upsert(&mut *self.records.lock().await, key, state, None)
    }

    async fn upsert_if(
        &self,
        key: &str,
        state: DedupState,
        expected: Option<u64>,
    ) -> Result<u64, StoreError> {
        apply_upsert(&mut *self.records.lock().await, key, state, Some(expected))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(id: &str) -> DedupState {
        DedupState::Cursor {
            last_seen_id: id.into(),
        }
    }

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let store = MemoryStore::new();
        assert!(!store.exists("k").await.unwrap());
        assert_eq!(store.upsert("k", cursor("a")).await.unwrap(), 1);
        assert_eq!(store.upsert("k", cursor("b")).await.unwrap(), 2);

        let rec = store.read("k").await.unwrap().unwrap();
        assert_eq!(rec.version, 2);
        assert_eq!(rec.state, cursor("b"));
    }

    #[tokio::test]
    async fn upsert_if_rejects_stale_version() {
        let store = MemoryStore::seeded("k", cursor("a"));
        assert_eq!(store.upsert_if("k", cursor("b"), Some(1)).await.unwrap(), 2);

        let err = store.upsert_if("k", cursor("c"), Some(1)).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Conflict {
                expected: Some(1),
                found: Some(2),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn upsert_if_absent_conflicts_when_present() {
        let store = MemoryStore::seeded("k", cursor("a"));
        assert!(matches!(
            store.upsert_if("k", cursor("b"), None).await,
            Err(StoreError::Conflict { .. })
        ));
        assert_eq!(store.upsert_if("other", cursor("b"), None).await.unwrap(), 1);
    }
}
