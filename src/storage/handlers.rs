//! Client KV Handlers
//!
//! HTTP endpoints exposing the store to clients. These figure out whether the
//! key belongs to this cluster — redirecting with a 307 when it does not —
//! and otherwise translate the request into `Store` calls.

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;

use super::protocol::{GetResponse, UpdateRequest, V1_GET_ROUTE, V1_UPDATE_ROUTE};
use super::store::Store;

/// Public write handler.
pub async fn handle_update(
    Extension(store): Extension<Arc<Store>>,
    Json(req): Json<UpdateRequest>,
) -> Response {
    if let Some(url) = store.redirect_url(&req.key, V1_UPDATE_ROUTE) {
        tracing::info!("Redirecting update for {} to {}", req.key, url);
        return Redirect::temporary(&url).into_response();
    }

    match store.set(&req.key, &req.value).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!("Failed to set {}: {}", req.key, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Public read handler.
pub async fn handle_get(
    Extension(store): Extension<Arc<Store>>,
    Path(key): Path<String>,
) -> Response {
    let path = format!("{}/{}", V1_GET_ROUTE, key);
    if let Some(url) = store.redirect_url(&key, &path) {
        tracing::info!("Redirecting read for {} to {}", key, url);
        return Redirect::temporary(&url).into_response();
    }

    let value = store.get(&key).await.unwrap_or_default();
    Json(GetResponse { key, value }).into_response()
}
