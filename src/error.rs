// src/error.rs
//! Error taxonomy for one pipeline run.
//!
//! - `FetchError`: listing unreachable or malformed. Fatal, nothing mutated.
//! - `StoreError`: dedup store read/upsert failure. Fatal on read; on commit the
//!   run is reported failed but deliveries are not rolled back.
//! - `DeliveryError`: per item, collected into the run report.

use crate::dedup::DedupStrategy;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("listing request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("listing returned HTTP {status} for {url}")]
    Status { status: u16, url: String },

    #[error("auth handshake rejected with HTTP {status}")]
    Auth { status: u16 },

    #[error("malformed listing markup: {0}")]
    Markup(String),
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("state store io: {0}")]
    Io(#[from] std::io::Error),

    #[error("state store document is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("version conflict on `{key}`: expected {expected:?}, found {found:?}")]
    Conflict {
        key: String,
        expected: Option<u64>,
        found: Option<u64>,
    },

    #[error("record `{key}` holds {stored:?} state but {configured:?} is configured")]
    StrategyMismatch {
        key: String,
        stored: DedupStrategy,
        configured: DedupStrategy,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("delivery rejected (HTTP {status}): {description}")]
    Rejected { status: u16, description: String },
}

/// Failures that abort a run before any side effect happened.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("reading dedup state failed: {0}")]
    StoreRead(#[source] StoreError),
}
