//! Client KV Protocol
//!
//! Route constants and DTOs for the public key-value endpoints. Requests for
//! keys owned by another cluster are answered with a temporary redirect to
//! the same path on the owning cluster.

use serde::{Deserialize, Serialize};

/// Public endpoint for client writes.
pub const V1_UPDATE_ROUTE: &str = "/v1/kv/update";
/// Public endpoint prefix for client reads; the key is the trailing path
/// segment.
pub const V1_GET_ROUTE: &str = "/v1/kv/get";

/// Client write request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
}

/// Client read response. An absent key answers with an empty value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetResponse {
    pub key: String,
    pub value: String,
}
