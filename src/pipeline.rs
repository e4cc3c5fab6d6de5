// src/pipeline.rs
//! One run: fetch → read state → filter → deliver all → commit.
//!
//! Fetch and state-read failures abort before any side effect. Delivery
//! failures are collected per item and never block the commit. A failed commit
//! is reported, deliveries are not rolled back.

use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

use crate::dedup::{self, DedupStore, DedupStrategy};
use crate::error::{RunError, StoreError};
use crate::ingest::types::{Candidate, CandidateSource};
use crate::notify::NotificationSink;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs by final status.");
        describe_counter!(
            "pipeline_items_fetched_total",
            "Candidates returned by the listing source."
        );
        describe_counter!(
            "pipeline_items_new_total",
            "Candidates that passed deduplication."
        );
        describe_counter!(
            "pipeline_delivery_failures_total",
            "Per-item delivery failures."
        );
        describe_counter!(
            "pipeline_commit_failures_total",
            "Dedup state commits that failed after delivery."
        );
        describe_counter!(
            "pipeline_fetch_errors_total",
            "Runs aborted by a listing fetch error."
        );
        describe_histogram!("pipeline_run_ms", "Pipeline run time in milliseconds.");
        describe_histogram!("ingest_fetch_ms", "Listing fetch + parse time in milliseconds.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every delivery succeeded and state is committed.
    Success,
    /// State committed, but at least one delivery failed.
    Partial,
    /// Commit failed (deliveries already happened).
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemOutcome {
    pub id: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum CommitOutcome {
    /// Nothing to write (unchanged cursor, empty set delta, empty batch).
    Skipped,
    Committed { version: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub fetched: usize,
    pub outcomes: Vec<ItemOutcome>,
    pub commit: CommitOutcome,
    pub status: RunStatus,
}

impl RunReport {
    pub fn delivered(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered).count()
    }

    pub fn failed_deliveries(&self) -> usize {
        self.outcomes.len() - self.delivered()
    }
}

pub struct IngestionPipeline {
    source: Arc<dyn CandidateSource>,
    store: Arc<dyn DedupStore>,
    sink: Arc<dyn NotificationSink>,
    store_key: String,
    strategy: DedupStrategy,
}

impl IngestionPipeline {
    pub fn new(
        source: Arc<dyn CandidateSource>,
        store: Arc<dyn DedupStore>,
        sink: Arc<dyn NotificationSink>,
        store_key: impl Into<String>,
        strategy: DedupStrategy,
    ) -> Self {
        Self {
            source,
            store,
            sink,
            store_key: store_key.into(),
            strategy,
        }
    }

    pub fn store(&self) -> &Arc<dyn DedupStore> {
        &self.store
    }

    pub fn store_key(&self) -> &str {
        &self.store_key
    }

    pub async fn run(&self) -> Result<RunReport, RunError> {
        ensure_metrics_described();
        let started_at = Utc::now();
        let t0 = std::time::Instant::now();

        let batch = match self.source.fetch().await {
            Ok(b) => b,
            Err(e) => {
                counter!("pipeline_fetch_errors_total").increment(1);
                tracing::warn!(target: "pipeline", source = self.source.name(), error = %e, "fetch failed, run aborted");
                return Err(e.into());
            }
        };

        let record = self
            .store
            .read(&self.store_key)
            .await
            .map_err(RunError::StoreRead)?;
        if let Some(rec) = &record {
            if rec.state.strategy() != self.strategy {
                return Err(RunError::StoreRead(StoreError::StrategyMismatch {
                    key: self.store_key.clone(),
                    stored: rec.state.strategy(),
                    configured: self.strategy,
                }));
            }
        }
        let prior = record.as_ref().map(|r| &r.state);
        let expected_version = record.as_ref().map(|r| r.version);

        let new_items = dedup::filter_new(&batch, prior);
        counter!("pipeline_items_new_total").increment(new_items.len() as u64);
        if new_items.is_empty() {
            tracing::info!(target: "pipeline", fetched = batch.len(), "no new deals");
        }

        let outcomes = self.deliver_all(&new_items).await;

        let commit = match dedup::commit(self.strategy, &batch, &new_items, prior) {
            None => CommitOutcome::Skipped,
            Some(next) => match self
                .store
                .upsert_if(&self.store_key, next, expected_version)
                .await
            {
                Ok(version) => CommitOutcome::Committed { version },
                Err(e) => {
                    counter!("pipeline_commit_failures_total").increment(1);
                    tracing::error!(
                        target: "pipeline",
                        key = %self.store_key,
                        error = %e,
                        "commit failed after delivery; next run may re-notify"
                    );
                    CommitOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
        };

        let status = if matches!(commit, CommitOutcome::Failed { .. }) {
            RunStatus::Failed
        } else if outcomes.iter().any(|o| !o.delivered) {
            RunStatus::Partial
        } else {
            RunStatus::Success
        };

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            fetched: batch.len(),
            outcomes,
            commit,
            status,
        };

        counter!("pipeline_runs_total", "status" => status.as_str()).increment(1);
        histogram!("pipeline_run_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        gauge!("pipeline_last_run_ts").set(report.finished_at.timestamp().max(0) as f64);

        tracing::info!(
            target: "pipeline",
            status = status.as_str(),
            fetched = report.fetched,
            new = report.outcomes.len(),
            delivered = report.delivered(),
            failed = report.failed_deliveries(),
            "run finished"
        );
        Ok(report)
    }

    /// Sequential, newest first; every item is attempted.
    async fn deliver_all(&self, items: &[Candidate]) -> Vec<ItemOutcome> {
        let mut outcomes = Vec::with_capacity(items.len());
        for item in items {
            match self.sink.deliver(item).await {
                Ok(()) => outcomes.push(ItemOutcome {
                    id: item.id.clone(),
                    delivered: true,
                    error: None,
                }),
                Err(e) => {
                    counter!("pipeline_delivery_failures_total").increment(1);
                    tracing::warn!(target: "notify", sink = self.sink.name(), id = %item.id, error = %e, "delivery failed");
                    outcomes.push(ItemOutcome {
                        id: item.id.clone(),
                        delivered: false,
                        error: Some(e.to_string()),
                    });
                }
            }
        }
        outcomes
    }
}
