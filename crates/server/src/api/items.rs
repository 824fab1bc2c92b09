//! `/api/items` CRUD (§6). Items are owned by this API layer and read by
//! the worker; deleting one cascades its matches via the schema's foreign
//! key, not anything this handler does explicitly.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use quarryscout_core::StoreError;

use crate::api::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ItemForm {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub async fn list_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ItemView>>, ApiError> {
    let items = state.engine.item_store().list().await?;
    Ok(Json(
        items
            .into_iter()
            .map(|i| ItemView { id: i.id, text: i.text })
            .collect(),
    ))
}

pub async fn create_item(
    State(state): State<Arc<AppState>>,
    axum::extract::Form(form): axum::extract::Form<ItemForm>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    match state.engine.item_store().insert(&form.text).await {
        Ok(id) => Ok((StatusCode::CREATED, Json(CreatedResponse { id }))),
        Err(StoreError::Duplicate) => Err(ApiError::new(
            StatusCode::CONFLICT,
            "Item already exists",
        )),
        Err(e) => Err(e.into()),
    }
}

pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    axum::extract::Form(form): axum::extract::Form<ItemForm>,
) -> Result<Json<OkResponse>, ApiError> {
    state.engine.item_store().update(id, &form.text).await?;
    Ok(Json(OkResponse { ok: true }))
}

pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<OkResponse>, ApiError> {
    state.engine.item_store().delete(id).await?;
    Ok(Json(OkResponse { ok: true }))
}
