// src/dedup/mod.rs
//! Novelty decision for a scraped batch.
//!
//! Two mutually exclusive strategies:
//! - **Cursor**: remember the newest id seen; everything before it in the
//!   newest-first listing is new. Relies on a stable listing order.
//! - **Set**: remember every id ever notified. Order-independent, grows
//!   without bound.
//!
//! `filter_new` and `commit` are pure; persistence lives in [`store`].

pub mod file;
pub mod memory;
pub mod store;

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::ingest::types::Candidate;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use store::{DedupStore, StoredRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupStrategy {
    #[default]
    Cursor,
    Set,
}

impl fmt::Display for DedupStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupStrategy::Cursor => f.write_str("cursor"),
            DedupStrategy::Set => f.write_str("set"),
        }
    }
}

impl FromStr for DedupStrategy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cursor" => Ok(DedupStrategy::Cursor),
            "set" => Ok(DedupStrategy::Set),
            other => anyhow::bail!("unknown dedup strategy `{other}` (expected `cursor` or `set`)"),
        }
    }
}

/// Persisted dedup state, tagged by strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum DedupState {
    Cursor { last_seen_id: String },
    Set { notified_ids: BTreeSet<String> },
}

impl DedupState {
    pub fn strategy(&self) -> DedupStrategy {
        match self {
            DedupState::Cursor { .. } => DedupStrategy::Cursor,
            DedupState::Set { .. } => DedupStrategy::Set,
        }
    }

    /// Whether `id` is known to have been notified already.
    pub fn has_seen(&self, id: &str) -> bool {
        match self {
            DedupState::Cursor { last_seen_id } => last_seen_id == id,
            DedupState::Set { notified_ids } => notified_ids.contains(id),
        }
    }
}

/// Items of `candidates` not yet notified, in the input (newest-first) order.
///
/// Absent state means nothing was ever notified. With a cursor that is not
/// in the batch (first run, or the listing moved past the polling window),
/// the whole batch is returned.
pub fn filter_new(candidates: &[Candidate], prior: Option<&DedupState>) -> Vec<Candidate> {
    match prior {
        None => candidates.to_vec(),
        Some(DedupState::Cursor { last_seen_id }) => candidates
            .iter()
            .take_while(|c| &c.id != last_seen_id)
            .cloned()
            .collect(),
        Some(DedupState::Set { notified_ids }) => candidates
            .iter()
            .filter(|c| !notified_ids.contains(&c.id))
            .cloned()
            .collect(),
    }
}

/// State to persist after delivery was attempted, or `None` when there is
/// nothing to write.
///
/// Cursor: the newest id of the *whole batch*, even when no item was new.
/// Set: prior ids plus every id in `new_items`.
pub fn commit(
    strategy: DedupStrategy,
    batch: &[Candidate],
    new_items: &[Candidate],
    prior: Option<&DedupState>,
) -> Option<DedupState> {
    match strategy {
        DedupStrategy::Cursor => {
            let newest = batch.first()?;
            match prior {
                Some(DedupState::Cursor { last_seen_id }) if *last_seen_id == newest.id => None,
                _ => Some(DedupState::Cursor {
                    last_seen_id: newest.id.clone(),
                }),
            }
        }
        DedupStrategy::Set => {
            if new_items.is_empty() {
                return None;
            }
            let mut notified_ids = match prior {
                Some(DedupState::Set { notified_ids }) => notified_ids.clone(),
                _ => BTreeSet::new(),
            };
            notified_ids.extend(new_items.iter().map(|c| c.id.clone()));
            Some(DedupState::Set { notified_ids })
        }
    }
}
