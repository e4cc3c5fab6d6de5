// src/dedup/store.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DedupState;
use crate::error::StoreError;

/// One logical record per fixed key. `version` starts at 1 and increments on
/// every successful upsert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub key: String,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
    pub state: DedupState,
}

/// Durable key-value store for dedup state.
#[async_trait::async_trait]
pub trait DedupStore: Send + Sync {
    async fn read(&self, key: &str) -> Result<Option<StoredRecord>, StoreError>;

    /// Insert or replace as a single logical operation. Returns the new version.
    async fn upsert(&self, key: &str, state: DedupState) -> Result<u64, StoreError>;

    /// Compare-and-swap on the record version. `expected = None` requires the
    /// record to still be absent. Fails with [`StoreError::Conflict`] otherwise.
    async fn upsert_if(
        &self,
        key: &str,
        state: DedupState,
        expected: Option<u64>,
    ) -> Result<u64, StoreError>;

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.read(key).await?.is_some())
    }
}

/// Shared CAS step for map-backed stores: validates `expected` and writes the
/// next record in place.
pub(crate) fn apply_upsert(
    records: &mut std::collections::BTreeMap<String, StoredRecord>,
    key: &str,
    state: DedupState,
    expected: Option<Option<u64>>,
) -> Result<u64, StoreError> {
    let found = records.get(key).map(|r| r.version);
    if let Some(expected) = expected {
        if expected != found {
            return Err(StoreError::Conflict {
                key: key.to_string(),
                expected,
                found,
            });
        }
    }
    let version = found.unwrap_or(0) + 1;
    records.insert(
        key.to_string(),
        StoredRecord {
            key: key.to_string(),
            version,
            updated_at: Utc::now(),
            state,
        },
    );
    Ok(version)
}
