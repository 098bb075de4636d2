//! Best-effort cache snapshots.
//!
//! A snapshot holds the most recently accessed entries, the tail of each
//! entry's access log and the lifetime hit/miss counters. Stores only move
//! bytes; decoding, age checks and restore live with the cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::fs;

use super::key::CacheKey;
use super::store::CacheEntry;

/// Entries kept in a snapshot.
pub const SNAPSHOT_MAX_ENTRIES: usize = 100;

/// Access-log timestamps kept per entry.
pub const SNAPSHOT_ACCESS_LOG_TAIL: usize = 20;

/// Errors from snapshot persistence.
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Serialized cache state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub timestamp: DateTime<Utc>,

    /// Most recently accessed first
    pub entries: Vec<(CacheKey, CacheEntry)>,

    pub access_log: BTreeMap<CacheKey, Vec<DateTime<Utc>>>,

    pub hits: u64,
    pub misses: u64,
}

impl CacheSnapshot {
    pub fn encode(&self) -> Result<Vec<u8>, PersistError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode a snapshot; malformed bytes are discarded with a warning.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match serde_json::from_slice(bytes) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                tracing::warn!(error = %e, bytes = bytes.len(), "Discarding malformed cache snapshot");
                None
            }
        }
    }
}

/// Where snapshot bytes live.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Read the last saved snapshot, if any.
    async fn load(&self) -> Result<Option<Vec<u8>>, PersistError>;

    /// Replace the saved snapshot.
    async fn save(&self, bytes: &[u8]) -> Result<(), PersistError>;
}

/// Snapshot file written atomically (temp file, then rename).
///
/// Saves through one store are serialized so concurrent writers never share
/// the temp file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
    save_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            save_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, PersistError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, bytes: &[u8]) -> Result<(), PersistError> {
        let _guard = self.save_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let temp = self.temp_path();
        fs::write(&temp, bytes).await?;
        fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

/// In-memory snapshot store for tests and embedders without a disk.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with the given bytes already saved.
    pub fn with_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes: Mutex::new(Some(bytes)),
        }
    }

    pub fn contents(&self) -> Option<Vec<u8>> {
        self.bytes.lock().clone()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn load(&self) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(self.bytes.lock().clone())
    }

    async fn save(&self, bytes: &[u8]) -> Result<(), PersistError> {
        *self.bytes.lock() = Some(bytes.to_vec());
        Ok(())
    }
}
