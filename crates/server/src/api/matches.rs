//! `/api/matches` (§6): read the up-to-200 most recent persisted matches,
//! or delete one by id.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::items::OkResponse;
use crate::state::AppState;

const MAX_MATCHES: usize = 200;

#[derive(Debug, Serialize)]
pub struct MatchView {
    pub id: i64,
    pub item: i64,
    pub url: String,
    pub site: String,
    pub torrent_text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub magnet_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<String>,
    pub created: DateTime<Utc>,
}

pub async fn list_matches(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<MatchView>>, ApiError> {
    let matches = state.engine.match_store().list_recent(MAX_MATCHES).await?;
    Ok(Json(
        matches
            .into_iter()
            .map(|m| MatchView {
                id: m.id,
                item: m.item_id,
                url: m.matched_url,
                site: m.source_site,
                torrent_text: m.matched_title,
                magnet_link: m.magnet_uri,
                file_size: m.file_size,
                created: m.created,
            })
            .collect(),
    ))
}

pub async fn delete_match(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state.engine.match_store().delete(id).await?;
    Ok(Json(OkResponse { ok: true }))
}
