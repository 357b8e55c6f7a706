use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, RwLock};

use crate::clock::hybrid::now_ms;
use crate::gossip::engine::{ApplyFn, GossipEngine, SnapshotFn};
use crate::gossip::types::ClusterConfig;

use super::sharder::ShardRouter;
use super::wal::{Wal, WalAction, WalEntry};

/// State shared between the store's public API and the capabilities handed
/// to the gossip engine. Holding it separately keeps the ownership one-way:
/// the store owns the engine, the engine's callbacks reach only this inner
/// state.
struct StoreShared {
    id: usize,
    map: RwLock<HashMap<String, String>>,
    wal: Mutex<Wal>,
}

impl StoreShared {
    /// Applies one write: intent record, map assignment, completion record.
    ///
    /// Lock order is map before log, matching every other path through the
    /// store. The intent append must succeed for the write to count; a
    /// failed completion append is logged and swallowed so the write can
    /// still propagate to the rest of the shard.
    async fn apply_write(&self, key: &str, val: &str, source: usize) -> Result<()> {
        let mut map = self.map.write().await;
        let mut wal = self.wal.lock().await;

        let start = WalEntry {
            action: WalAction::StartWrite,
            key: key.to_string(),
            val: val.to_string(),
            time: now_ms(),
            source,
        };
        wal.append(&start)?;

        tracing::info!("Setting key {} (source node {})", key, source);
        map.insert(key.to_string(), val.to_string());

        let finish = WalEntry {
            action: WalAction::FinishedWrite,
            key: key.to_string(),
            val: val.to_string(),
            time: now_ms(),
            source,
        };
        if let Err(e) = wal.append(&finish) {
            tracing::error!("Failed to record completion for {}: {}", key, e);
        }
        Ok(())
    }

    /// JSON-encodes the whole map, the opaque blob served in state handoffs.
    async fn snapshot_bytes(&self) -> Vec<u8> {
        let map = self.map.read().await;
        serde_json::to_vec(&*map).unwrap_or_default()
    }

    /// Installs a handoff blob received from a peer. The blob is the peer's
    /// map snapshot; local log replay is applied on top afterwards, so a
    /// recovered local write beats the snapshot for its key.
    async fn install_snapshot(&self, data: &[u8]) {
        let entries: HashMap<String, String> = match serde_json::from_slice(data) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Discarding unreadable state handoff: {}", e);
                return;
            }
        };
        tracing::info!("Installing {} key(s) from state handoff", entries.len());
        let mut map = self.map.write().await;
        map.extend(entries);
    }
}

/// The node-local key-value store.
///
/// Owns the in-memory map, the write-ahead log, the shard router, and the
/// gossip engine that replicates committed writes to shard siblings.
pub struct Store {
    shared: Arc<StoreShared>,
    engine: Arc<GossipEngine>,
    router: ShardRouter,
}

impl Store {
    /// Opens the log, replays it, wires up the gossip engine, and runs the
    /// initial peer discovery plus state handoff.
    ///
    /// Log open and replay failures are fatal: a node with a corrupt log must
    /// not serve. Discovery and handoff failures are not: the node starts
    /// with whatever it recovered locally and converges through gossip.
    pub async fn open(mount: &Path, cfg: ClusterConfig) -> Result<Arc<Self>> {
        let mut wal = Wal::open(mount)?;
        let recovered = wal.replay().context("write-ahead log replay failed")?;

        let shared = Arc::new(StoreShared {
            id: cfg.id,
            map: RwLock::new(HashMap::new()),
            wal: Mutex::new(wal),
        });

        let apply_shared = Arc::clone(&shared);
        let apply: ApplyFn = Arc::new(move |payload: Vec<u8>| {
            let shared = Arc::clone(&apply_shared);
            Box::pin(async move {
                let entry: WalEntry = serde_json::from_slice(&payload)
                    .context("malformed replicated write payload")?;
                shared.apply_write(&entry.key, &entry.val, entry.source).await
            }) as Pin<Box<dyn Future<Output = Result<()>> + Send>>
        });

        let snapshot_shared = Arc::clone(&shared);
        let snapshot: SnapshotFn = Arc::new(move || {
            let shared = Arc::clone(&snapshot_shared);
            Box::pin(async move { shared.snapshot_bytes().await })
                as Pin<Box<dyn Future<Output = Vec<u8>> + Send>>
        });

        let router = ShardRouter::new(&cfg);
        let engine = GossipEngine::new(cfg, apply, snapshot);

        engine.peers().refresh().await;
        if let Some(data) = engine.fetch_initial_state().await {
            shared.install_snapshot(&data).await;
        }

        // Recovered log entries win over the handoff snapshot for their keys.
        if !recovered.is_empty() {
            let mut map = shared.map.write().await;
            map.extend(recovered);
        }

        tracing::info!("Store ready");
        Ok(Arc::new(Self {
            shared,
            engine,
            router,
        }))
    }

    /// Writes a key owned by this shard and publishes the write to peers.
    ///
    /// The write is durable and visible locally before the publish begins;
    /// replication is best effort and never fails the request.
    pub async fn set(&self, key: &str, val: &str) -> Result<()> {
        let now = now_ms();
        self.shared.apply_write(key, val, self.shared.id).await?;

        let finish = WalEntry {
            action: WalAction::FinishedWrite,
            key: key.to_string(),
            val: val.to_string(),
            time: now,
            source: self.shared.id,
        };
        let payload = serde_json::to_vec(&finish)?;
        self.engine.publish(now, payload).await;
        Ok(())
    }

    /// Reads a key. Absent keys are `None`, not an error.
    pub async fn get(&self, key: &str) -> Option<String> {
        let map = self.shared.map.read().await;
        map.get(key).cloned()
    }

    /// The owning cluster's URL for a foreign key, or `None` to handle the
    /// request locally.
    pub fn redirect_url(&self, key: &str, path: &str) -> Option<String> {
        self.router.redirect_url(key, path)
    }

    pub fn engine(&self) -> &Arc<GossipEngine> {
        &self.engine
    }

    pub async fn entry_count(&self) -> usize {
        self.shared.map.read().await.len()
    }

    /// Flushes the log to disk. Called once during shutdown, after the HTTP
    /// server has drained.
    pub async fn close(&self) {
        let mut wal = self.shared.wal.lock().await;
        if let Err(e) = wal.sync() {
            tracing::error!("Failed to sync log on shutdown: {}", e);
        } else {
            tracing::info!("Log synced, store closed");
        }
    }
}
