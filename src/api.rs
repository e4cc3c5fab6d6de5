// src/api.rs
//! Status surface for the service binary: `/health` and `/status`.
//! `/metrics` is merged in by the binary once the recorder is installed.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::dedup::DedupStore;
use crate::ingest::scheduler::{LastRun, RunSummary};

#[derive(Clone)]
pub struct AppState {
    pub last_run: LastRun,
    pub store: Arc<dyn DedupStore>,
    pub store_key: String,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/status", get(status))
        .with_state(state)
}

#[derive(Serialize)]
struct StatusResp {
    store_key: String,
    /// `None` when the store could not be read.
    state_initialized: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_error: Option<String>,
    last_run: Option<RunSummary>,
}

async fn status(State(state): State<AppState>) -> Json<StatusResp> {
    let (state_initialized, store_error) = match state.store.exists(&state.store_key).await {
        Ok(v) => (Some(v), None),
        Err(e) => (None, Some(e.to_string())),
    };
    Json(StatusResp {
        store_key: state.store_key.clone(),
        state_initialized,
        store_error,
        last_run: state.last_run.get(),
    })
}
