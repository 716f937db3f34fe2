//! Local-disk cache store
//!
//! Entries live at `<root>/<algorithm>/<hex>.json`, addressed by digest the
//! same way blob caches lay out content stores. Writes go through a
//! temporary file and an atomic rename so concurrent readers never observe a
//! half-written entry.

use super::{CacheStore, CacheStoreError};
use crate::compiler::DependencyArtifactSet;
use crate::recipe::CacheKey;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

// Distinguishes concurrent writers within one process; the pid handles
// writers in other processes sharing the cache directory.
static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(key.algorithm())
            .join(format!("{}.json", key.hex()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<DependencyArtifactSet>, CacheStoreError> {
        let path = self.entry_path(key);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(CacheStoreError::Io(format!("{}: {e}", path.display()))),
        };

        let set = serde_json::from_str(&raw).map_err(|e| CacheStoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(Some(set))
    }

    async fn put(
        &self,
        key: &CacheKey,
        artifacts: &DependencyArtifactSet,
    ) -> Result<(), CacheStoreError> {
        let path = self.entry_path(key);
        let parent = path
            .parent()
            .ok_or_else(|| CacheStoreError::Io(format!("no parent for {}", path.display())))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| CacheStoreError::Io(format!("{}: {e}", parent.display())))?;

        let json = serde_json::to_string_pretty(artifacts).map_err(|e| CacheStoreError::Corrupt {
            key: key.to_string(),
            message: e.to_string(),
        })?;

        // Write-then-rename keeps the entry invisible until complete. The
        // temp name is unique per writer so concurrent puts for the same key
        // never interleave into one file; last rename wins intact.
        let tmp = parent.join(format!(
            ".{}.{}.{}.tmp",
            key.hex(),
            std::process::id(),
            TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| CacheStoreError::Io(format!("{}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| CacheStoreError::Io(format!("{}: {e}", path.display())))?;

        debug!("Cached artifact set at {}", path.display());
        Ok(())
    }
}
