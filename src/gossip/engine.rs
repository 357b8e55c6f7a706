use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use dashmap::DashMap;
use rand::seq::SliceRandom;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::clock::hybrid::{ClockOrdering, HybridVecClock};

use super::peers::PeerSet;
use super::protocol::{SeenMarker, StateResponse, V1_MESSAGE_ROUTE, V1_STATE_ROUTE};
use super::types::{ClusterConfig, Event, Node};

/// Interval between peer discovery refreshes.
const REFRESH_INTERVAL: Duration = Duration::from_secs(30);
/// Timeout for a single fan-out post. Failures are logged, never retried.
const FANOUT_TIMEOUT: Duration = Duration::from_secs(2);
/// Timeout for the whole-state bootstrap fetch.
const STATE_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Capability the store hands the engine for applying a replicated payload.
pub type ApplyFn =
    Arc<dyn Fn(Vec<u8>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// Capability the store hands the engine for snapshotting its data, used to
/// serve the state handoff to a joining replica.
pub type SnapshotFn = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Vec<u8>> + Send>> + Send + Sync>;

/// The epidemic propagation engine for one replica.
///
/// Owns the hybrid vector clock, the seen-set, and the peer list. The store
/// owns the engine; the engine only holds the two capabilities back into the
/// store, so there is no ownership cycle. Payload bytes pass through opaque.
pub struct GossipEngine {
    cfg: ClusterConfig,
    info: Node,
    clock: RwLock<HybridVecClock>,
    seen: DashMap<String, ()>,
    peers: PeerSet,
    client: reqwest::Client,
    apply: ApplyFn,
    snapshot: SnapshotFn,
}

impl GossipEngine {
    pub fn new(cfg: ClusterConfig, apply: ApplyFn, snapshot: SnapshotFn) -> Arc<Self> {
        let info = Node {
            id: cfg.id,
            ip: cfg.ip,
        };
        let clock = HybridVecClock::new(cfg.nodes_per_cluster);
        let peers = PeerSet::new(&cfg);
        Arc::new(Self {
            cfg,
            info,
            clock: RwLock::new(clock),
            seen: DashMap::new(),
            peers,
            client: reqwest::Client::new(),
            apply,
            snapshot,
        })
    }

    /// This node's identity as served on `/info`.
    pub fn info(&self) -> Node {
        self.info.clone()
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    /// Spawns the periodic peer refresh. The loop holds no locks across its
    /// sleep and exits as soon as the token is cancelled.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(REFRESH_INTERVAL);
            // The first tick completes immediately; initial discovery already
            // ran during startup.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("Peer refresh loop exiting");
                        break;
                    }
                    _ = interval.tick() => {
                        engine.peers.refresh().await;
                    }
                }
            }
        });
    }

    /// Publishes a freshly committed local write to the shard.
    ///
    /// Bumps this node's clock slot, stamps the write's wall-clock time,
    /// and fans the event out. The clock lock is released before any network
    /// call. Fan-out is best effort; the write is already durable locally.
    pub async fn publish(&self, write_time_ms: u64, payload: Vec<u8>) {
        let clock = {
            let mut guard = self.clock.write().await;
            guard.vec[self.cfg.id] += 1;
            guard.timestamp = write_time_ms;
            guard.snapshot()
        };

        let event = Event {
            id: format!("{}:{}", self.cfg.id, Uuid::new_v4().simple()),
            source: self.cfg.id,
            from: self.cfg.id,
            clock,
            payload,
        };
        tracing::info!("Generated event {}", event.id);

        self.seen.insert(event.id.clone(), ());
        self.forward(event).await;
    }

    /// Handles an event delivered by a peer.
    ///
    /// Duplicates and self-originated events are dropped silently. Otherwise
    /// the clocks decide: a newer event is merged, applied through the store
    /// capability, and re-forwarded; anything else is stale and dropped.
    pub async fn on_message(&self, event: Event) {
        if self.seen.contains_key(&event.id) || event.source == self.cfg.id {
            tracing::debug!("Ignoring event {}: duplicate or own", event.id);
            return;
        }

        let ordering = {
            let guard = self.clock.read().await;
            guard.compare(&event.clock)
        };
        match ordering {
            ClockOrdering::Newer => {
                {
                    let mut guard = self.clock.write().await;
                    guard.merge(&event.clock);
                }
                // Atomic claim of the ID; a concurrent delivery of the same
                // event applies it exactly once.
                if self.seen.insert(event.id.clone(), ()).is_some() {
                    tracing::debug!("Ignoring event {}: duplicate or own", event.id);
                    return;
                }
                if let Err(e) = (self.apply)(event.payload.clone()).await {
                    tracing::warn!("Failed to apply event {}: {}", event.id, e);
                }
                self.forward(event).await;
            }
            ClockOrdering::Older => {
                tracing::debug!("Ignoring event {}: older than local clock", event.id);
            }
        }
    }

    /// Posts the event to a random subset of peers.
    ///
    /// The peer whose ID matches the event's sender is excluded — it already
    /// has the event and would only drop it again. `from` is rewritten to
    /// this node before serialization so the next hop excludes us in turn.
    async fn forward(&self, mut event: Event) {
        let peers = self.peers.snapshot().await;
        let targets = select_targets(&peers, event.from, self.cfg.forwards);
        if targets.is_empty() {
            return;
        }

        event.from = self.cfg.id;
        let body = match serde_json::to_vec(&event) {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Failed to serialize event {}: {}", event.id, e);
                return;
            }
        };

        for node in targets {
            let url = format!("http://{}:{}{}", node.ip, self.cfg.port, V1_MESSAGE_ROUTE);
            let response = self
                .client
                .post(&url)
                .header("content-type", "application/json")
                .body(body.clone())
                .timeout(FANOUT_TIMEOUT)
                .send()
                .await;
            match response {
                Ok(res) if res.status().is_success() => {}
                Ok(res) => {
                    tracing::error!(
                        "Forward of {} to node {} returned {}",
                        event.id,
                        node.id,
                        res.status()
                    );
                }
                Err(e) => {
                    tracing::error!("Forward of {} to node {} failed: {}", event.id, node.id, e);
                }
            }
        }
    }

    /// Assembles the snapshot served on `/state`: the full seen-set plus the
    /// store's current data blob, passed through untouched.
    pub async fn state_snapshot(&self) -> StateResponse {
        let state: HashMap<String, SeenMarker> = self
            .seen
            .iter()
            .map(|entry| (entry.key().clone(), SeenMarker {}))
            .collect();
        let data = (self.snapshot)().await;
        StateResponse { state, data }
    }

    /// Number of event IDs this node has processed.
    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    /// Copy of the local clock, for introspection.
    pub async fn clock_snapshot(&self) -> HybridVecClock {
        self.clock.read().await.snapshot()
    }

    /// Fetches the whole-state handoff from this node's lower-ID neighbor.
    ///
    /// Only nodes with `id > 0` bootstrap, and only when discovery found
    /// peers. The fetched seen-set replaces the local one; the opaque data
    /// blob is returned for the store to install. Every failure path logs and
    /// returns `None` — a replica that cannot bootstrap starts empty and
    /// converges through gossip instead.
    pub async fn fetch_initial_state(&self) -> Option<Vec<u8>> {
        if self.cfg.id == 0 {
            return None;
        }
        let peers = self.peers.snapshot().await;
        if peers.is_empty() {
            tracing::info!("No peers discovered, starting with empty state");
            return None;
        }
        let Some(predecessor) = peers.get(self.cfg.id - 1) else {
            tracing::warn!(
                "Predecessor node {} not in peer set, starting with empty state",
                self.cfg.id - 1
            );
            return None;
        };

        tracing::info!("Fetching initial state from node {}", predecessor.id);
        match self.fetch_state(predecessor).await {
            Ok(response) => {
                self.seen.clear();
                for id in response.state.keys() {
                    self.seen.insert(id.clone(), ());
                }
                tracing::info!("Installed {} seen event(s) from handoff", self.seen.len());
                Some(response.data)
            }
            Err(e) => {
                tracing::warn!("State fetch failed, starting with empty state: {}", e);
                None
            }
        }
    }

    async fn fetch_state(&self, node: &Node) -> Result<StateResponse> {
        let url = format!("http://{}:{}{}", node.ip, self.cfg.port, V1_STATE_ROUTE);
        let response = self
            .client
            .get(&url)
            .timeout(STATE_FETCH_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("state fetch returned {}", response.status());
        }
        Ok(response.json().await?)
    }
}

/// Picks the forwarding targets for one hop: every peer except the event's
/// immediate sender, sampled uniformly without replacement, capped at the
/// configured fan-out.
pub(crate) fn select_targets(peers: &[Node], exclude_from: usize, forwards: usize) -> Vec<Node> {
    let candidates: Vec<&Node> = peers.iter().filter(|peer| peer.id != exclude_from).collect();
    let count = forwards.min(candidates.len());
    let mut rng = rand::thread_rng();
    candidates
        .choose_multiple(&mut rng, count)
        .map(|node| (*node).clone())
        .collect()
}
