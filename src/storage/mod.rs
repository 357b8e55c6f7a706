//! Durable Storage Module
//!
//! Owns the local half of the store: the in-memory key-value map, the
//! append-only write-ahead log that makes writes crash-recoverable, and the
//! hash-based key-to-shard routing.
//!
//! ## Core Concepts
//! - **Write-ahead logging**: every write lands in the log before it touches
//!   the map. On startup the log is replayed to rebuild the map.
//! - **Sharding**: keys are mapped to clusters by hashing; a request for a
//!   foreign cluster's key is answered with a redirect instead of data.
//! - **Replication hook**: committed local writes are handed to the gossip
//!   engine as opaque payload bytes; replicated writes come back through the
//!   same apply path, tagged with their original source node.

pub mod handlers;
pub mod protocol;
pub mod sharder;
pub mod store;
pub mod wal;

#[cfg(test)]
mod tests;
