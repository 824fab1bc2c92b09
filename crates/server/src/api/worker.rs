//! `/api/trigger-worker` and `/api/worker-status` (§6, §4.10).

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use quarryscout_core::TriggerOutcome;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: &'static str,
    pub message: &'static str,
}

pub async fn trigger_worker(State(state): State<Arc<AppState>>) -> Json<TriggerResponse> {
    let response = match state.engine.trigger_worker() {
        TriggerOutcome::Started => TriggerResponse {
            status: "triggered",
            message: "worker run started",
        },
        TriggerOutcome::AlreadyRunning => TriggerResponse {
            status: "already_running",
            message: "a worker run is already in progress",
        },
    };
    Json(response)
}

#[derive(Debug, Serialize)]
pub struct WorkerStatusResponse {
    pub running: bool,
}

pub async fn worker_status(State(state): State<Arc<AppState>>) -> Json<WorkerStatusResponse> {
    Json(WorkerStatusResponse {
        running: state.engine.is_worker_running(),
    })
}
