//! Storage Module Tests
//!
//! Validates the write-ahead log format and replay rules, the durable write
//! protocol of the store, and recovery across a restart. Disk tests run
//! against throwaway directories.

#[cfg(test)]
mod tests {
    use crate::gossip::types::ClusterConfig;
    use crate::storage::store::Store;
    use crate::storage::wal::{Wal, WalAction, WalEntry, WAL_FILE_PATH};
    use std::net::IpAddr;

    fn entry(action: WalAction, key: &str, val: &str, time: u64) -> WalEntry {
        WalEntry {
            action,
            key: key.to_string(),
            val: val.to_string(),
            time,
            source: 0,
        }
    }

    /// One node, one cluster: writes stay local, fan-out is a no-op.
    fn single_node_config() -> ClusterConfig {
        ClusterConfig {
            id: 0,
            cluster: 0,
            total_clusters: 1,
            nodes_per_cluster: 1,
            lookup_host: "localhost".to_string(),
            cluster_host_pattern: "cluster-%d.kvstore.svc".to_string(),
            ip: "127.0.0.1".parse::<IpAddr>().unwrap(),
            port: 9090,
            forwards: 1,
        }
    }

    // ============================================================
    // LOG FORMAT
    // ============================================================

    #[test]
    fn test_entry_serializes_action_as_integer() {
        let start = entry(WalAction::StartWrite, "k", "v", 7);
        let json = serde_json::to_string(&start).expect("Serialization failed");

        assert!(
            json.contains("\"action\":1"),
            "StartWrite must encode as 1, got: {}",
            json
        );

        let finish = entry(WalAction::FinishedWrite, "k", "v", 7);
        let json = serde_json::to_string(&finish).expect("Serialization failed");
        assert!(
            json.contains("\"action\":2"),
            "FinishedWrite must encode as 2, got: {}",
            json
        );
    }

    #[test]
    fn test_entry_round_trip() {
        let original = entry(WalAction::StartWrite, "user_1", "alice", 1_700_000_000_000);

        let json = serde_json::to_string(&original).expect("Serialization failed");
        let restored: WalEntry = serde_json::from_str(&json).expect("Deserialization failed");

        assert_eq!(restored, original);
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result: Result<WalEntry, _> = serde_json::from_str(
            r#"{"action":9,"key":"k","val":"v","time":1,"source":0}"#,
        );
        assert!(result.is_err(), "Unknown action values must not parse");
    }

    // ============================================================
    // REPLAY
    // ============================================================

    #[test]
    fn test_replay_of_missing_log_is_empty() {
        let dir = tempfile::tempdir().expect("create temp dir");

        let mut wal = Wal::open(dir.path()).expect("open log");
        let recovered = wal.replay().expect("replay");

        assert!(recovered.is_empty());
    }

    #[test]
    fn test_replay_keeps_last_start_write_per_key() {
        let dir = tempfile::tempdir().expect("create temp dir");

        {
            let mut wal = Wal::open(dir.path()).expect("open log");
            wal.replay().expect("replay");
            for (key, val, time) in [("a", "1", 1), ("a", "2", 2), ("b", "3", 3)] {
                wal.append(&entry(WalAction::StartWrite, key, val, time))
                    .expect("append start");
                wal.append(&entry(WalAction::FinishedWrite, key, val, time))
                    .expect("append finish");
            }
        }

        let mut wal = Wal::open(dir.path()).expect("reopen log");
        let recovered = wal.replay().expect("replay");

        assert_eq!(recovered.len(), 2);
        assert_eq!(recovered.get("a").map(String::as_str), Some("2"));
        assert_eq!(recovered.get("b").map(String::as_str), Some("3"));
    }

    #[test]
    fn test_replay_ignores_finished_write_records() {
        let dir = tempfile::tempdir().expect("create temp dir");

        {
            let mut wal = Wal::open(dir.path()).expect("open log");
            wal.replay().expect("replay");
            // A completion without its intent: must not materialize a key.
            wal.append(&entry(WalAction::FinishedWrite, "ghost", "x", 1))
                .expect("append");
        }

        let mut wal = Wal::open(dir.path()).expect("reopen log");
        let recovered = wal.replay().expect("replay");

        assert!(recovered.is_empty());
    }

    #[test]
    fn test_corrupt_record_aborts_replay() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join(WAL_FILE_PATH);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{\"action\":1,\"key\":\"a\",\"val\":\"1\",\"time\":1,\"source\":0}\nnot json\n")
            .unwrap();

        let mut wal = Wal::open(dir.path()).expect("open log");
        assert!(
            wal.replay().is_err(),
            "A corrupt record must refuse recovery, not drop writes silently"
        );
    }

    #[test]
    fn test_appends_after_replay_extend_the_log() {
        let dir = tempfile::tempdir().expect("create temp dir");

        {
            let mut wal = Wal::open(dir.path()).expect("open log");
            wal.replay().expect("replay");
            wal.append(&entry(WalAction::StartWrite, "a", "1", 1))
                .expect("append");
        }
        {
            // Replay positions the handle at end-of-file; the older record
            // must survive the second run's appends.
            let mut wal = Wal::open(dir.path()).expect("reopen log");
            wal.replay().expect("replay");
            wal.append(&entry(WalAction::StartWrite, "b", "2", 2))
                .expect("append");
        }

        let mut wal = Wal::open(dir.path()).expect("reopen log");
        let recovered = wal.replay().expect("replay");
        assert_eq!(recovered.get("a").map(String::as_str), Some("1"));
        assert_eq!(recovered.get("b").map(String::as_str), Some("2"));
    }

    // ============================================================
    // STORE WRITE PROTOCOL
    // ============================================================

    #[tokio::test]
    async fn test_set_then_get() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Store::open(dir.path(), single_node_config())
            .await
            .expect("open store");

        store.set("key1", "v1").await.expect("set");

        assert_eq!(store.get("key1").await.as_deref(), Some("v1"));
        assert_eq!(store.entry_count().await, 1);
    }

    #[tokio::test]
    async fn test_get_missing_key_is_none() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Store::open(dir.path(), single_node_config())
            .await
            .expect("open store");

        assert_eq!(store.get("nothing").await, None);
    }

    #[tokio::test]
    async fn test_set_writes_intent_and_completion_records() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Store::open(dir.path(), single_node_config())
            .await
            .expect("open store");

        store.set("key1", "v1").await.expect("set");
        store.close().await;

        let contents =
            std::fs::read_to_string(dir.path().join(WAL_FILE_PATH)).expect("read log file");
        let entries: Vec<WalEntry> = contents
            .lines()
            .map(|line| serde_json::from_str(line).expect("log line parses"))
            .collect();

        assert_eq!(entries.len(), 2, "One write must log exactly two records");
        assert_eq!(entries[0].action, WalAction::StartWrite);
        assert_eq!(entries[1].action, WalAction::FinishedWrite);
        assert_eq!(entries[0].key, "key1");
        assert_eq!(entries[0].val, "v1");
    }

    #[tokio::test]
    async fn test_set_bumps_clock_slot() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = Store::open(dir.path(), single_node_config())
            .await
            .expect("open store");

        store.set("k", "v1").await.expect("set");
        store.set("k", "v2").await.expect("set");

        let clock = store.engine().clock_snapshot().await;
        assert_eq!(
            clock.vec,
            vec![2],
            "Slot 0 must strictly increase with every local write"
        );
    }

    // ============================================================
    // RECOVERY ACROSS RESTART
    // ============================================================

    #[tokio::test]
    async fn test_restart_restores_written_state() {
        let dir = tempfile::tempdir().expect("create temp dir");

        {
            let store = Store::open(dir.path(), single_node_config())
                .await
                .expect("open store");
            store.set("a", "1").await.expect("set");
            store.set("a", "2").await.expect("set");
            store.set("b", "3").await.expect("set");
            store.close().await;
        }

        let store = Store::open(dir.path(), single_node_config())
            .await
            .expect("reopen store");

        assert_eq!(store.get("a").await.as_deref(), Some("2"));
        assert_eq!(store.get("b").await.as_deref(), Some("3"));
        assert_eq!(store.entry_count().await, 2);
    }

    #[tokio::test]
    async fn test_restart_map_matches_pre_restart_map() {
        let dir = tempfile::tempdir().expect("create temp dir");

        let mut expected = Vec::new();
        {
            let store = Store::open(dir.path(), single_node_config())
                .await
                .expect("open store");
            for i in 0..20 {
                let key = format!("key-{:02}", i);
                let val = format!("val-{}", i * i);
                store.set(&key, &val).await.expect("set");
                expected.push((key, val));
            }
            store.close().await;
        }

        let store = Store::open(dir.path(), single_node_config())
            .await
            .expect("reopen store");

        for (key, val) in expected {
            assert_eq!(
                store.get(&key).await.as_deref(),
                Some(val.as_str()),
                "Key {} must survive the restart",
                key
            );
        }
    }

    // ============================================================
    // REPLICATED WRITES
    // ============================================================

    #[tokio::test]
    async fn test_replicated_payload_applies_through_the_engine() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = ClusterConfig {
            id: 0,
            nodes_per_cluster: 2,
            ..single_node_config()
        };
        let store = Store::open(dir.path(), cfg).await.expect("open store");

        // What node 1 would gossip after committing k=v locally.
        let payload = serde_json::to_vec(&WalEntry {
            action: WalAction::FinishedWrite,
            key: "k".to_string(),
            val: "v".to_string(),
            time: 10,
            source: 1,
        })
        .unwrap();
        let event = crate::gossip::types::Event {
            id: "1:remote".to_string(),
            source: 1,
            from: 1,
            clock: crate::clock::hybrid::HybridVecClock {
                vec: vec![0, 1],
                timestamp: 10,
            },
            payload,
        };

        store.engine().on_message(event).await;

        assert_eq!(
            store.get("k").await.as_deref(),
            Some("v"),
            "A delivered event must install the replicated value"
        );
        assert_eq!(store.engine().clock_snapshot().await.vec, vec![0, 1]);
    }

    #[tokio::test]
    async fn test_replicated_write_survives_restart() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let cfg = ClusterConfig {
            id: 0,
            nodes_per_cluster: 2,
            ..single_node_config()
        };

        {
            let store = Store::open(dir.path(), cfg.clone()).await.expect("open");
            let payload = serde_json::to_vec(&WalEntry {
                action: WalAction::FinishedWrite,
                key: "replicated".to_string(),
                val: "value".to_string(),
                time: 10,
                source: 1,
            })
            .unwrap();
            store
                .engine()
                .on_message(crate::gossip::types::Event {
                    id: "1:x".to_string(),
                    source: 1,
                    from: 1,
                    clock: crate::clock::hybrid::HybridVecClock {
                        vec: vec![0, 1],
                        timestamp: 10,
                    },
                    payload,
                })
                .await;
            store.close().await;
        }

        let store = Store::open(dir.path(), cfg).await.expect("reopen");
        assert_eq!(store.get("replicated").await.as_deref(), Some("value"));
    }
}
