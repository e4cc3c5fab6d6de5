// src/notify/mod.rs
pub mod telegram;

use crate::error::DeliveryError;
use crate::ingest::types::Candidate;

pub use telegram::TelegramSink;

/// Best-effort delivery of a single item. No retries inside a run.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, item: &Candidate) -> Result<(), DeliveryError>;
    fn name(&self) -> &'static str;
}

/// Dry-run sink: logs what would be sent.
#[derive(Debug, Default, Clone)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, item: &Candidate) -> Result<(), DeliveryError> {
        tracing::info!(
            target: "notify",
            id = %item.id,
            title = %item.title,
            media = %item.media_ref,
            "dry-run: would deliver"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
