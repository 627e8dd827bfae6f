//! Cache persistence.
//!
//! The snapshot is gzip-compressed JSON:
//!
//! ```text
//! { "version": 1, "saved_at": "...", "entries": [ { "key": [...], "tier": "dynamic",
//!   "value": ..., "updated_at": "..." } ] }
//! ```

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{debug, info, warn};

use elementhook_config::{CacheConfig, ConfigLoader};

use crate::cache::{EntrySnapshot, QueryCache};
use crate::error::CacheError;
use crate::key::QueryKey;
use crate::policy::CacheTier;

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    saved_at: DateTime<Utc>,
    entries: Vec<SnapshotEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    key: QueryKey,
    tier: CacheTier,
    value: Value,
    updated_at: DateTime<Utc>,
}

/// Writes and rehydrates cache snapshots.
#[derive(Debug, Clone)]
pub struct CachePersister {
    path: PathBuf,
    max_age: Duration,
}

impl CachePersister {
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    /// Build from config; a leading `~` in the path is expanded.
    pub fn from_config(config: &CacheConfig) -> Self {
        let path = ConfigLoader::expand_path(&config.persist_path.to_string_lossy());
        Self::new(
            PathBuf::from(path),
            Duration::from_secs(config.persist_max_age_secs),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write every valued entry; returns the number written.
    pub async fn save(&self, cache: &QueryCache) -> Result<usize, CacheError> {
        let now = Utc::now();
        let entries: Vec<SnapshotEntry> = cache
            .export()
            .into_iter()
            .map(|e| SnapshotEntry {
                updated_at: now - chrono::Duration::from_std(e.age).unwrap_or(chrono::Duration::zero()),
                key: e.key,
                tier: e.tier,
                value: e.value,
            })
            .collect();
        let count = entries.len();

        let bytes = encode(&Snapshot {
            version: SNAPSHOT_VERSION,
            saved_at: now,
            entries,
        })?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Saved {} cache entries to {:?}", count, self.path);
        Ok(count)
    }

    /// Rehydrate `cache`; returns the number of entries restored.
    ///
    /// A missing file restores nothing. A snapshot older than `max_age` is
    /// deleted, and entries older than their tier's gc time are skipped.
    pub async fn load(&self, cache: &QueryCache) -> Result<usize, CacheError> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let snapshot = decode(&bytes)?;
        if snapshot.version != SNAPSHOT_VERSION {
            warn!(version = snapshot.version, "Ignoring cache snapshot with unknown version");
            return Ok(0);
        }

        let now = Utc::now();
        if age_since(snapshot.saved_at, now) > self.max_age {
            info!("Discarding expired cache snapshot from {}", snapshot.saved_at);
            self.clear().await?;
            return Ok(0);
        }

        let mut restored = 0;
        for entry in snapshot.entries {
            let age = age_since(entry.updated_at, now);
            if age >= entry.tier.policy().gc_time {
                continue;
            }
            cache.restore(EntrySnapshot {
                key: entry.key,
                tier: entry.tier,
                value: entry.value,
                age,
            });
            restored += 1;
        }

        debug!("Restored {} cache entries from {:?}", restored, self.path);
        Ok(restored)
    }

    /// Delete the snapshot file if present.
    pub async fn clear(&self) -> Result<(), CacheError> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

fn age_since(then: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - then).to_std().unwrap_or(Duration::ZERO)
}

fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, CacheError> {
    let json = serde_json::to_vec(snapshot).map_err(|e| CacheError::Persist(e.to_string()))?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

fn decode(bytes: &[u8]) -> Result<Snapshot, CacheError> {
    let mut json = Vec::new();
    GzDecoder::new(bytes)
        .read_to_end(&mut json)
        .map_err(|e| CacheError::Persist(format!("corrupt snapshot: {}", e)))?;
    serde_json::from_slice(&json).map_err(|e| CacheError::Persist(e.to_string()))
}
