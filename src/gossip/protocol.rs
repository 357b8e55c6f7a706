//! Gossip Network Protocol
//!
//! Route constants and Data Transfer Objects for the internode endpoints
//! every replica serves. All three endpoints speak JSON over HTTP.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Endpoint returning this node's identity, probed during peer discovery.
pub const V1_INFO_ROUTE: &str = "/v1/gossip/info";
/// Endpoint returning the full seen-set and data snapshot, fetched by a
/// freshly started replica during the state handoff.
pub const V1_STATE_ROUTE: &str = "/v1/gossip/state";
/// Endpoint accepting a gossiped event.
pub const V1_MESSAGE_ROUTE: &str = "/v1/gossip/message";

/// Marker value under each event ID in the state snapshot. Serializes as an
/// empty JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeenMarker {}

/// Whole-state snapshot handed to a newly joined replica.
///
/// `state` is the serving node's seen-set; it replaces the fetcher's own.
/// `data` is an opaque blob produced by the store's snapshot capability —
/// the gossip layer moves the bytes without interpreting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateResponse {
    pub state: HashMap<String, SeenMarker>,
    pub data: Vec<u8>,
}
