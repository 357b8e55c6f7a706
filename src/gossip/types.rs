use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::clock::hybrid::HybridVecClock;

/// Identity of one replica inside a shard.
///
/// Node IDs within a shard are dense integers in `[0, nodes_per_cluster)`,
/// assigned by deployment. The ID doubles as the node's slot index in the
/// hybrid vector clock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: usize,
    pub ip: IpAddr,
}

/// A replicated write traveling through the shard.
///
/// `id` is `"<source-node-id>:<unique-token>"` and globally unique across the
/// shard; it keys the seen-set. `source` is the node that originated the
/// write and never changes; `from` is the immediate sender and is rewritten
/// at every forwarding hop so the recipient can skip echoing the event back.
///
/// The payload is an opaque serialized log record. The gossip layer never
/// parses it; only the store interprets payload bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub source: usize,
    pub from: usize,
    pub clock: HybridVecClock,
    pub payload: Vec<u8>,
}

/// Immutable node and shard topology, populated from the environment at
/// startup.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// This node's ID within its cluster, in `[0, nodes_per_cluster)`.
    pub id: usize,
    /// Index of the cluster this node belongs to.
    pub cluster: usize,
    /// Fixed number of clusters the keyspace is partitioned across.
    pub total_clusters: usize,
    /// Replica count per cluster; also the vector clock slot count.
    pub nodes_per_cluster: usize,
    /// DNS name resolving to the addresses of this cluster's members.
    pub lookup_host: String,
    /// Host pattern for foreign clusters, with a single `%d` placeholder for
    /// the cluster index. Ex: "cluster-%d.kvstore.svc".
    pub cluster_host_pattern: String,
    /// This node's own address, used to drop itself from discovery results.
    pub ip: IpAddr,
    /// Port every node serves HTTP on.
    pub port: u16,
    /// Number of peers each event is forwarded to per hop.
    pub forwards: usize,
}
