use axum::{
    extract::Extension,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::future::IntoFuture;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sysinfo::System;
use tokio_util::sync::CancellationToken;

use anyhow::{Context, Result};
use gossip_store::gossip::engine::GossipEngine;
use gossip_store::gossip::handlers::{handle_info, handle_message, handle_state};
use gossip_store::gossip::protocol::{V1_INFO_ROUTE, V1_MESSAGE_ROUTE, V1_STATE_ROUTE};
use gossip_store::gossip::types::ClusterConfig;
use gossip_store::storage::handlers::{handle_get, handle_update};
use gossip_store::storage::protocol::{V1_GET_ROUTE, V1_UPDATE_ROUTE};
use gossip_store::storage::store::Store;

/// Bound on how long in-flight requests may keep draining after a shutdown
/// signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let cfg = cluster_config_from_env()?;
    let mount = PathBuf::from(required_env("MOUNT_PATH")?);

    tracing::info!(
        "Starting node {} of cluster {} ({} clusters, {} nodes each)",
        cfg.id,
        cfg.cluster,
        cfg.total_clusters,
        cfg.nodes_per_cluster
    );

    // 1. Storage layer (opens and replays the log, discovers peers, runs the
    //    initial state handoff):
    let store = Store::open(&mount, cfg.clone()).await?;
    let engine = store.engine().clone();

    // 2. Background peer refresh:
    let cancel = CancellationToken::new();
    engine.start(cancel.clone());

    // 3. Shutdown signal handler:
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        signal_cancel.cancel();
    });

    // 4. HTTP router — client KV routes, internode gossip routes, health:
    let app = Router::new()
        .route("/health/routes", get(handle_routes))
        .route("/health/stats", get(handle_stats))
        .route(V1_UPDATE_ROUTE, post(handle_update))
        .route(&format!("{}/:key", V1_GET_ROUTE), get(handle_get))
        .route(V1_INFO_ROUTE, get(handle_info))
        .route(V1_STATE_ROUTE, get(handle_state))
        .route(V1_MESSAGE_ROUTE, post(handle_message))
        .layer(Extension(store.clone()))
        .layer(Extension(engine.clone()))
        .layer(Extension(Arc::new(cfg.clone())));

    // 5. Serve until signalled, then drain within the grace window:
    let listener =
        tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], cfg.port))).await?;
    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    let drain = cancel.clone();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move { drain.cancelled().await })
        .into_future();

    let grace = cancel.clone();
    tokio::select! {
        result = server => result?,
        _ = async {
            grace.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        } => {
            tracing::warn!("Drain window elapsed with requests still in flight");
        }
    }

    store.close().await;
    tracing::info!("Shutting down");
    Ok(())
}

fn required_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{} is not set", name))
}

fn cluster_config_from_env() -> Result<ClusterConfig> {
    let id = required_env("ID")?
        .parse()
        .context("ID must be an integer")?;
    let cluster = required_env("CLUSTER")?
        .parse()
        .context("CLUSTER must be an integer")?;
    let total_clusters = required_env("TOTAL_CLUSTERS")?
        .parse()
        .context("TOTAL_CLUSTERS must be an integer")?;
    let nodes_per_cluster = required_env("NODES_PER_CLUSTER")?
        .parse()
        .context("NODES_PER_CLUSTER must be an integer")?;
    let lookup_host = required_env("LOOKUP_HOST")?;
    let cluster_host_pattern = required_env("CLUSTER_HOST_PATTERN")?;
    let ip: IpAddr = required_env("IP")?
        .parse()
        .context("IP must be an IP address")?;
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(9090);
    let forwards = std::env::var("FORWARDS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(2);

    Ok(ClusterConfig {
        id,
        cluster,
        total_clusters,
        nodes_per_cluster,
        lookup_host,
        cluster_host_pattern,
        ip,
        port,
        forwards,
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[derive(Serialize)]
struct RoutesResponse {
    routes: Vec<&'static str>,
}

#[derive(Serialize)]
struct NodeStatsResponse {
    node_id: usize,
    cluster: usize,
    ip: String,
    peer_count: usize,
    store_entries: usize,
    seen_events: usize,
    clock_vec: Vec<u64>,
    clock_timestamp: u64,
    cpu_usage: f32,
    mem_used_mb: u64,
    mem_total_mb: u64,
}

async fn handle_routes() -> Json<RoutesResponse> {
    Json(RoutesResponse {
        routes: vec![
            "/health/routes",
            "/health/stats",
            "/v1/kv/update",
            "/v1/kv/get/:key",
            "/v1/gossip/info",
            "/v1/gossip/state",
            "/v1/gossip/message",
        ],
    })
}

async fn handle_stats(
    Extension(store): Extension<Arc<Store>>,
    Extension(engine): Extension<Arc<GossipEngine>>,
    Extension(cfg): Extension<Arc<ClusterConfig>>,
) -> Json<NodeStatsResponse> {
    let info = engine.info();
    let clock = engine.clock_snapshot().await;

    let mut sys = System::new_all();
    sys.refresh_cpu();
    sys.refresh_memory();
    let cpu_usage = sys.global_cpu_info().cpu_usage();
    // sysinfo returns bytes for memory values.
    let mem_total_mb = sys.total_memory() / (1024 * 1024);
    let mem_used_mb = sys.used_memory() / (1024 * 1024);

    Json(NodeStatsResponse {
        node_id: info.id,
        cluster: cfg.cluster,
        ip: info.ip.to_string(),
        peer_count: engine.peers().len().await,
        store_entries: store.entry_count().await,
        seen_events: engine.seen_count(),
        clock_vec: clock.vec,
        clock_timestamp: clock.timestamp,
        cpu_usage,
        mem_used_mb,
        mem_total_mb,
    })
}
