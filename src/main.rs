//! Deal notifier service entrypoint.
//! Runs the ingest pipeline on an interval and serves `/health`, `/status`
//! and `/metrics` through Axum on Shuttle.

use std::sync::Arc;

use deal_notifier::api::{self, AppState};
use deal_notifier::ingest::scheduler::{spawn_scheduler, LastRun, Runner, SchedulerCfg};
use deal_notifier::metrics::Metrics;
use deal_notifier::{build_pipeline, logging, AppConfig};
use shuttle_axum::ShuttleAxum;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = AppConfig::load()?;
    tracing::info!(
        site = %cfg.site_url,
        strategy = %cfg.store.strategy,
        key = %cfg.store.key,
        interval_secs = cfg.run_interval_secs,
        dry_run = cfg.dry_run,
        "config loaded"
    );

    let metrics = Metrics::install(cfg.run_interval_secs)?;
    let pipeline = Arc::new(build_pipeline(&cfg).await?);

    let last_run = LastRun::default();
    let state = AppState {
        last_run: last_run.clone(),
        store: pipeline.store().clone(),
        store_key: pipeline.store_key().to_string(),
    };

    spawn_scheduler(
        SchedulerCfg {
            interval_secs: cfg.run_interval_secs,
        },
        Runner::new(pipeline, last_run),
    );

    let router = api::router(state).merge(metrics.router());
    Ok(router.into())
}
