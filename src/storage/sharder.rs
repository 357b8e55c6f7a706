//! Shard Router
//!
//! Responsible for mapping keys to clusters and forming redirect targets for
//! keys this node does not own. It ensures a deterministic distribution of
//! the keyspace.
//!
//! ## Mechanism
//! - **Hashing**: the first 8 bytes of the key's SHA-256 digest, read
//!   big-endian, taken modulo the cluster count. Every node computes the
//!   same mapping independently, across restarts and across languages.
//! - **Redirects**: a foreign key yields the owning cluster's hostname by
//!   filling the configured host pattern; the caller adds scheme, port, and
//!   the original request path.

use sha2::{Digest, Sha256};

use crate::gossip::types::ClusterConfig;

/// Maps keys to the cluster that owns them.
pub struct ShardRouter {
    total_clusters: usize,
    local_cluster: usize,
    host_pattern: String,
    port: u16,
}

impl ShardRouter {
    pub fn new(cfg: &ClusterConfig) -> Self {
        Self {
            total_clusters: cfg.total_clusters,
            local_cluster: cfg.cluster,
            host_pattern: cfg.cluster_host_pattern.clone(),
            port: cfg.port,
        }
    }

    /// Maps a key to its owning cluster index.
    pub fn shard_of(&self, key: &str) -> usize {
        let digest = Sha256::digest(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.total_clusters as u64) as usize
    }

    /// The owning cluster's hostname for a foreign key, or `None` when the
    /// key belongs to the local cluster and should be handled here.
    pub fn redirect_authority(&self, key: &str) -> Option<String> {
        let shard = self.shard_of(key);
        if shard == self.local_cluster {
            return None;
        }
        Some(self.host_pattern.replacen("%d", &shard.to_string(), 1))
    }

    /// Full redirect URL for a foreign key, preserving the request path.
    pub fn redirect_url(&self, key: &str, path: &str) -> Option<String> {
        self.redirect_authority(key)
            .map(|authority| format!("http://{}:{}{}", authority, self.port, path))
    }
}
