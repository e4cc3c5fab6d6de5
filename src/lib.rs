// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod config;
pub mod dedup;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod pipeline;

use std::sync::Arc;

pub use crate::config::AppConfig;
pub use crate::error::{DeliveryError, FetchError, RunError, StoreError};
pub use crate::ingest::types::{Candidate, CandidateSource};
pub use crate::pipeline::{IngestionPipeline, RunReport, RunStatus};

use crate::dedup::{DedupStore, FileStore, MemoryStore};
use crate::ingest::providers::primezone::PrimezoneSource;
use crate::notify::{LogSink, NotificationSink, TelegramSink};

/// Wire the production collaborators described by `cfg`.
///
/// A dry run reads the persisted state but keeps its writes in memory.
pub async fn build_pipeline(cfg: &AppConfig) -> anyhow::Result<IngestionPipeline> {
    let source = PrimezoneSource::new(cfg.site_url.clone(), cfg.http_timeout())?
        .with_auth_token(cfg.auth_token.clone())
        .with_pages(cfg.listing_pages);

    let file_store = FileStore::new(cfg.store.path.clone());
    let store: Arc<dyn DedupStore> = if cfg.dry_run {
        match file_store.read(&cfg.store.key).await? {
            Some(record) => Arc::new(MemoryStore::seeded(&cfg.store.key, record.state)),
            None => Arc::new(MemoryStore::new()),
        }
    } else {
        Arc::new(file_store)
    };

    let sink: Arc<dyn NotificationSink> = match (&cfg.telegram, cfg.dry_run) {
        (Some(tg), false) => Arc::new(
            TelegramSink::new(tg.bot_token.clone(), tg.chat_id.clone())
                .with_api_base(tg.api_base.clone())
                .with_timeout(cfg.http_timeout_secs),
        ),
        _ => Arc::new(LogSink),
    };

    Ok(IngestionPipeline::new(
        Arc::new(source),
        store,
        sink,
        cfg.store.key.clone(),
        cfg.store.strategy,
    ))
}

/// Single entry point: one fetch → filter → deliver → commit pass.
pub async fn run_once(cfg: &AppConfig) -> anyhow::Result<RunReport> {
    let pipeline = build_pipeline(cfg).await?;
    Ok(pipeline.run().await?)
}
