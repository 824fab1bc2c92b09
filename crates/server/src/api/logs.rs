//! `/api/logs` (§6): paginated per-item run summaries, and a bulk clear.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::state::AppState;

const PAGE_SIZE: usize = 25;

#[derive(Debug, Deserialize)]
pub struct LogsQuery {
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct LogView {
    pub id: i64,
    pub description: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct LogsResponse {
    pub logs: Vec<LogView>,
    pub page: usize,
    pub page_size: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub ok: bool,
    pub deleted: u64,
}

pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<LogsResponse>, ApiError> {
    let page = query.page.unwrap_or(1).max(1);
    let page_result = state.engine.log_store().list_page(page, PAGE_SIZE).await?;
    Ok(Json(LogsResponse {
        logs: page_result
            .logs
            .into_iter()
            .map(|l| LogView {
                id: l.id,
                description: l.description,
                success: l.success,
                timestamp: l.timestamp,
            })
            .collect(),
        page: page_result.page,
        page_size: page_result.page_size,
        total: page_result.total,
        total_pages: page_result.total_pages,
    }))
}

pub async fn delete_logs(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let deleted = state.engine.log_store().delete_all().await?;
    Ok(Json(DeletedResponse { ok: true, deleted }))
}
