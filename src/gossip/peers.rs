//! Peer Discovery
//!
//! Maintains the set of sibling replicas inside the local shard. Discovery
//! resolves a DNS name (typically a headless service) into addresses, probes
//! each address for its identity, and replaces the peer list wholesale. The
//! list is refreshed on a fixed interval for as long as the node runs.

use std::net::IpAddr;
use std::time::Duration;

use tokio::sync::RwLock;

use super::protocol::V1_INFO_ROUTE;
use super::types::{ClusterConfig, Node};

/// Per-probe timeout for the `/info` identity fetch.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Discovered peers within the local shard, excluding the node itself.
pub struct PeerSet {
    nodes: RwLock<Vec<Node>>,
    client: reqwest::Client,
    lookup_host: String,
    local_ip: IpAddr,
    port: u16,
}

impl PeerSet {
    pub fn new(cfg: &ClusterConfig) -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            client: reqwest::Client::new(),
            lookup_host: cfg.lookup_host.clone(),
            local_ip: cfg.ip,
            port: cfg.port,
        }
    }

    /// Re-resolves the lookup host and probes every address for its identity.
    ///
    /// The union of successful probes replaces the peer list. A DNS failure
    /// keeps the previous list — a transient resolver outage must not make
    /// the node forget a shard it was already gossiping with. Individual
    /// probe failures skip that peer. Refresh never takes the process down.
    pub async fn refresh(&self) {
        let addrs = match tokio::net::lookup_host((self.lookup_host.as_str(), self.port)).await {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::warn!(
                    "Peer lookup for {} failed, keeping previous peer set: {}",
                    self.lookup_host,
                    e
                );
                return;
            }
        };

        let mut nodes = Vec::new();
        for addr in addrs {
            let ip = addr.ip();
            if ip == self.local_ip {
                continue;
            }
            match self.probe(ip).await {
                Ok(node) => nodes.push(node),
                Err(e) => {
                    tracing::warn!("Skipping peer {}: {}", ip, e);
                }
            }
        }

        tracing::debug!("Peer refresh discovered {} node(s)", nodes.len());
        let mut guard = self.nodes.write().await;
        *guard = nodes;
    }

    /// Fetches `{id, ip}` from one candidate address.
    async fn probe(&self, ip: IpAddr) -> anyhow::Result<Node> {
        let url = format!("http://{}:{}{}", ip, self.port, V1_INFO_ROUTE);
        let response = self
            .client
            .get(&url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("info probe returned {}", response.status());
        }
        let node: Node = response.json().await?;
        Ok(node)
    }

    /// Copy of the current peer list. Callers issue network I/O against the
    /// copy, never while the lock is held.
    pub async fn snapshot(&self) -> Vec<Node> {
        self.nodes.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.nodes.read().await.len()
    }

    #[cfg(test)]
    pub async fn install(&self, nodes: Vec<Node>) {
        *self.nodes.write().await = nodes;
    }
}
