//! Gossip Propagation Module
//!
//! Implements the epidemic replication layer for one shard. A committed local
//! write becomes an `Event` stamped with the node's hybrid vector clock; the
//! event is posted to a random subset of peers, each of which applies it and
//! re-forwards. Information spreads through the shard with O(log N)
//! convergence, barring partitions.
//!
//! ## Core Mechanisms
//! - **Seen-set deduplication**: every node records the IDs of events it has
//!   processed; a repeated delivery is dropped before it can be re-applied or
//!   re-forwarded. This is the authoritative propagation loop breaker.
//! - **Sender exclusion**: each event carries the ID of its immediate sender,
//!   and forwarding skips that peer. Purely an optimization on top of the
//!   seen-set; it avoids a send that is guaranteed to be dropped.
//! - **Clock-gated delivery**: an incoming event is applied only when its
//!   clock compares as newer than the local one (with the wall-clock
//!   tiebreak); stale events are dropped without touching the store.
//! - **State handoff**: a freshly started replica fetches the full seen-set
//!   and data snapshot from its lower-ID neighbor so subsequent gossip works
//!   against a converged baseline.

pub mod engine;
pub mod handlers;
pub mod peers;
pub mod protocol;
pub mod types;
