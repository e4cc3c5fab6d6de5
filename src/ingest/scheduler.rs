// src/ingest/scheduler.rs
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::pipeline::{CommitOutcome, IngestionPipeline, RunReport, RunStatus};

#[derive(Clone, Copy, Debug)]
pub struct SchedulerCfg {
    pub interval_secs: u64,
}

/// What `/status` shows about the latest run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunSummary {
    Completed {
        finished_at: DateTime<Utc>,
        status: RunStatus,
        fetched: usize,
        delivered: usize,
        failed: usize,
        commit: CommitOutcome,
    },
    Aborted {
        finished_at: DateTime<Utc>,
        error: String,
    },
}

impl From<&RunReport> for RunSummary {
    fn from(r: &RunReport) -> Self {
        RunSummary::Completed {
            finished_at: r.finished_at,
            status: r.status,
            fetched: r.fetched,
            delivered: r.delivered(),
            failed: r.failed_deliveries(),
            commit: r.commit.clone(),
        }
    }
}

/// Latest run summary, shared between the scheduler and the HTTP surface.
#[derive(Clone, Default)]
pub struct LastRun {
    inner: Arc<RwLock<Option<RunSummary>>>,
}

impl LastRun {
    pub fn set(&self, s: RunSummary) {
        let mut guard = self.inner.write().expect("last-run lock poisoned");
        *guard = Some(s);
    }

    pub fn get(&self) -> Option<RunSummary> {
        self.inner.read().expect("last-run lock poisoned").clone()
    }
}

/// Non-reentrant runner: a run that is still in flight makes the next
/// trigger a no-op instead of a second concurrent execution.
#[derive(Clone)]
pub struct Runner {
    pipeline: Arc<IngestionPipeline>,
    last: LastRun,
    busy: Arc<Mutex<()>>,
}

impl Runner {
    pub fn new(pipeline: Arc<IngestionPipeline>, last: LastRun) -> Self {
        Self {
            pipeline,
            last,
            busy: Arc::new(Mutex::new(())),
        }
    }

    pub fn pipeline(&self) -> &Arc<IngestionPipeline> {
        &self.pipeline
    }

    /// `None` when another run holds the guard.
    pub async fn trigger(&self) -> Option<RunSummary> {
        let Ok(_guard) = self.busy.try_lock() else {
            tracing::warn!(target: "ingest", "previous run still in progress, skipping trigger");
            return None;
        };
        let summary = match self.pipeline.run().await {
            Ok(report) => RunSummary::from(&report),
            Err(e) => {
                tracing::error!(target: "ingest", error = %e, "run aborted");
                RunSummary::Aborted {
                    finished_at: Utc::now(),
                    error: e.to_string(),
                }
            }
        };
        self.last.set(summary.clone());
        Some(summary)
    }
}

/// Runs the pipeline on a fixed interval; the first run starts immediately.
pub fn spawn_scheduler(cfg: SchedulerCfg, runner: Runner) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(cfg.interval_secs.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            if let Some(summary) = runner.trigger().await {
                tracing::info!(target: "ingest", ?summary, "scheduled run done");
            }
        }
    })
}
