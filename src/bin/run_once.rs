//! Manual trigger: one pipeline pass, then exit.
//! Exit code: 0 success, 2 partial (some deliveries failed), 1 failed/aborted.

use deal_notifier::{logging, run_once, AppConfig, RunStatus};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let code = match run().await {
        Ok(RunStatus::Success) => 0,
        Ok(RunStatus::Partial) => 2,
        Ok(RunStatus::Failed) => 1,
        Err(e) => {
            tracing::error!("run failed: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

async fn run() -> anyhow::Result<RunStatus> {
    let cfg = AppConfig::load()?;
    let report = run_once(&cfg).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.status)
}
