//! Hybrid Vector Clock Module
//!
//! Tracks causality between writes replicated within one shard. Each node owns
//! one slot of the vector and bumps it on every local write; the attached
//! wall-clock timestamp is used only to break ties between events the vector
//! ordering calls concurrent.

pub mod hybrid;
