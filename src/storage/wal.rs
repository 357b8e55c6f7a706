//! Write-Ahead Log
//!
//! Newline-delimited JSON, one record per line, appended before and after
//! every map mutation. The file is never truncated or compacted; recovery
//! reads it start to end and keeps the last `StartWrite` per key.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Log location relative to the persistent volume mount.
pub const WAL_FILE_PATH: &str = ".store/wal.jsonl";

/// Record kind. Encoded as its integer value on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum WalAction {
    /// Durable intent, written before the map is touched. The only record
    /// kind that replay applies.
    StartWrite = 1,
    /// Completion marker. Skipped on replay so a write is never applied
    /// twice; its serialized form doubles as the gossip payload.
    FinishedWrite = 2,
}

impl From<WalAction> for u8 {
    fn from(action: WalAction) -> u8 {
        action as u8
    }
}

impl TryFrom<u8> for WalAction {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(WalAction::StartWrite),
            2 => Ok(WalAction::FinishedWrite),
            other => Err(format!("unknown log action {}", other)),
        }
    }
}

/// One log record.
///
/// `time` is Unix milliseconds; `source` is the node that originated the
/// write, which for replicated writes differs from the node doing the append.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    pub action: WalAction,
    pub key: String,
    pub val: String,
    pub time: u64,
    pub source: usize,
}

/// Handle on the log file. Opened once at startup, closed at shutdown.
pub struct Wal {
    file: File,
    path: PathBuf,
}

impl Wal {
    /// Opens (or creates) the log under the given mount path, creating the
    /// parent directory as needed. Failure here is fatal to startup.
    pub fn open(mount: &Path) -> Result<Self> {
        let path = mount.join(WAL_FILE_PATH);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create log directory {}", dir.display()))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("failed to open log {}", path.display()))?;
        Ok(Self { file, path })
    }

    /// Reads the log from the beginning and rebuilds the map it describes.
    ///
    /// Every line must parse; a corrupt record aborts recovery rather than
    /// silently dropping writes. Only `StartWrite` records are applied,
    /// last one per key wins. Afterwards the handle points at end-of-file so
    /// subsequent appends extend the log.
    pub fn replay(&mut self) -> Result<HashMap<String, String>> {
        self.file.seek(SeekFrom::Start(0))?;
        let mut recovered = HashMap::new();
        {
            let reader = BufReader::new(&self.file);
            for line in reader.lines() {
                let line = line.context("failed to read log line")?;
                let entry: WalEntry = serde_json::from_str(&line)
                    .with_context(|| format!("corrupt log record: {:?}", line))?;
                if entry.action != WalAction::StartWrite {
                    continue;
                }
                recovered.insert(entry.key, entry.val);
            }
        }
        self.file.seek(SeekFrom::End(0))?;
        tracing::info!(
            "Replayed log {} ({} key(s) recovered)",
            self.path.display(),
            recovered.len()
        );
        Ok(recovered)
    }

    /// Appends one record and a trailing newline.
    pub fn append(&mut self, entry: &WalEntry) -> Result<()> {
        let mut line = serde_json::to_vec(entry)?;
        line.push(b'\n');
        self.file
            .write_all(&line)
            .context("failed to append log record")?;
        Ok(())
    }

    /// Forces appended records down to disk. Called once at shutdown.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all().context("failed to sync log")?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
