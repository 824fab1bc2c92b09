//! `/api/urls` CRUD (§6). "Urls" in the REST surface map onto this
//! system's `Site` domain type; the per-site scraping config arrives as a
//! JSON-encoded string form field and is decoded before being stored.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use quarryscout_core::{Site, SiteConfig, StoreError};

use crate::api::error::ApiError;
use crate::api::items::OkResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SiteForm {
    pub url: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub config: Option<String>,
}

impl SiteForm {
    fn parse_config(&self) -> Result<Option<SiteConfig>, ApiError> {
        match &self.config {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() => Ok(None),
            Some(raw) => serde_json::from_str(raw)
                .map(Some)
                .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid config JSON: {e}"))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SiteView {
    pub id: i64,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<SiteConfig>,
}

impl From<Site> for SiteView {
    fn from(s: Site) -> Self {
        Self {
            id: s.id,
            url: s.url,
            display_name: s.display_name,
            config: s.config,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

pub async fn list_sites(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SiteView>>, ApiError> {
    let sites = state.engine.site_store().list().await?;
    Ok(Json(sites.into_iter().map(SiteView::from).collect()))
}

pub async fn create_site(
    State(state): State<Arc<AppState>>,
    axum::extract::Form(form): axum::extract::Form<SiteForm>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let config = form.parse_config()?;
    match state
        .engine
        .site_store()
        .insert(&form.url, form.display_name.as_deref(), config)
        .await
    {
        Ok(id) => Ok((StatusCode::CREATED, Json(CreatedResponse { id }))),
        Err(StoreError::Duplicate) => {
            Err(ApiError::new(StatusCode::CONFLICT, "Url already exists"))
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn update_site(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    axum::extract::Form(form): axum::extract::Form<SiteForm>,
) -> Result<Json<OkResponse>, ApiError> {
    let config = form.parse_config()?;
    state
        .engine
        .site_store()
        .update(id, &form.url, form.display_name.as_deref(), config)
        .await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn delete_site(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state.engine.site_store().delete(id).await?;
    Ok(Json(OkResponse { ok: true }))
}
