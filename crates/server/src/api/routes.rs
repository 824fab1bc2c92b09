use std::sync::Arc;

use axum::http::StatusCode;
use axum::middleware as axum_middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use super::middleware::metrics_middleware;
use super::{health, items, logs, matches, sites, worker, ws};
use crate::metrics::encode_metrics;
use crate::state::AppState;

async fn metrics_handler() -> (StatusCode, String) {
    (StatusCode::OK, encode_metrics())
}

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health::health))
        .route(
            "/items",
            get(items::list_items).post(items::create_item),
        )
        .route(
            "/items/{id}",
            axum::routing::put(items::update_item).delete(items::delete_item),
        )
        .route("/urls", get(sites::list_sites).post(sites::create_site))
        .route(
            "/urls/{id}",
            axum::routing::put(sites::update_site).delete(sites::delete_site),
        )
        .route("/matches", get(matches::list_matches))
        .route("/matches/{id}", delete(matches::delete_match))
        .route(
            "/logs",
            get(logs::list_logs).delete(logs::delete_logs),
        )
        .route("/trigger-worker", post(worker::trigger_worker))
        .route("/worker-status", get(worker::worker_status))
        .route("/ws", get(ws::ws_handler))
        .layer(axum_middleware::from_fn(metrics_middleware))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(metrics_handler))
}
