//! Dependency artifact cache
//!
//! The cache store is an injected collaborator, never ambient state. Entries
//! are immutable once written: a changed recipe produces a new key rather
//! than mutating an existing entry. Stores must tolerate concurrent readers;
//! writer coordination per key is handled by the dependency stage builder.

pub mod disk;
pub mod memory;

use crate::compiler::DependencyArtifactSet;
use crate::recipe::CacheKey;
use async_trait::async_trait;
use thiserror::Error;

pub use disk::DiskCacheStore;
pub use memory::MemoryCacheStore;

/// Store failures are transient: the whole pipeline may be retried, but no
/// partial cache state may ever be assumed.
#[derive(Debug, Error)]
pub enum CacheStoreError {
    #[error("Cache store I/O failure: {0}")]
    Io(String),

    #[error("Cache entry for {key} is corrupt: {message}")]
    Corrupt { key: String, message: String },
}

/// Narrow persistent-store interface for dependency artifact sets
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<DependencyArtifactSet>, CacheStoreError>;

    /// Store a complete artifact set under its key. Implementations must make
    /// the entry visible atomically: readers see either nothing or the full
    /// set, never a partial write.
    async fn put(
        &self,
        key: &CacheKey,
        artifacts: &DependencyArtifactSet,
    ) -> Result<(), CacheStoreError>;
}
