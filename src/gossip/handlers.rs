//! Gossip API Handlers
//!
//! HTTP endpoints every replica serves for its shard siblings: identity,
//! whole-state handoff, and event delivery. These translate requests into
//! calls on the `GossipEngine`.

use axum::{body::Bytes, extract::Extension, http::StatusCode, Json};
use std::sync::Arc;

use super::engine::GossipEngine;
use super::protocol::StateResponse;
use super::types::{Event, Node};

/// Identity probe used during peer discovery.
pub async fn handle_info(Extension(engine): Extension<Arc<GossipEngine>>) -> Json<Node> {
    Json(engine.info())
}

/// Whole-state snapshot served to a joining replica.
pub async fn handle_state(
    Extension(engine): Extension<Arc<GossipEngine>>,
) -> Json<StateResponse> {
    Json(engine.state_snapshot().await)
}

/// Event delivery endpoint.
///
/// The body is taken as raw bytes and parsed by hand rather than through the
/// `Json` extractor: a malformed body of any kind — bad JSON or not even
/// UTF-8 — must answer 500 without touching any state, while duplicates are
/// dropped inside the engine and still answer 200.
pub async fn handle_message(
    Extension(engine): Extension<Arc<GossipEngine>>,
    body: Bytes,
) -> StatusCode {
    let event: Event = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            tracing::error!("Failed to parse incoming event: {}", e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };
    engine.on_message(event).await;
    StatusCode::OK
}
