//! In-memory cache store, for tests and single-invocation use

use super::{CacheStore, CacheStoreError};
use crate::compiler::DependencyArtifactSet;
use crate::recipe::CacheKey;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, DependencyArtifactSet>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().await.contains_key(key)
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> Result<Option<DependencyArtifactSet>, CacheStoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(
        &self,
        key: &CacheKey,
        artifacts: &DependencyArtifactSet,
    ) -> Result<(), CacheStoreError> {
        self.entries
            .write()
            .await
            .insert(key.clone(), artifacts.clone());
        Ok(())
    }
}
