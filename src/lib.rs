//! Sharded, Gossip-Replicated Key-Value Store Library
//!
//! This library crate defines the core modules of the store.
//! It serves as the foundation for the binary executable (`main.rs`).
//!
//! ## Architecture Modules
//! The system is composed of three loosely coupled subsystems:
//!
//! - **`clock`**: Hybrid vector-clock arithmetic. Provides the causal ordering
//!   between replicated writes and a wall-clock tiebreaker for events that are
//!   truly concurrent.
//! - **`gossip`**: The epidemic propagation engine. Handles event creation,
//!   deduplication, random fan-out forwarding, peer discovery, and the state
//!   handoff that brings freshly started replicas up to speed.
//! - **`storage`**: The durable state layer. Owns the in-memory key-value map,
//!   the append-only write-ahead log replayed on startup, and the hash-based
//!   key-to-shard routing that redirects foreign writes.

pub mod clock;
pub mod gossip;
pub mod storage;
