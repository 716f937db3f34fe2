//! Dependency stage builder
//!
//! Get-or-build against the injected cache store. On a hit the stored set is
//! returned untouched; application code never influences this stage. On a
//! miss every dependency is compiled in isolation on bounded parallel
//! workers, and the complete set is stored only after every unit succeeded.
//! Concurrent builders racing on the same cold key coordinate through a
//! per-key single-flight lock so the work happens once.

use crate::cache::CacheStore;
use crate::compiler::{Compiler, DependencyArtifact, DependencyArtifactSet};
use crate::error::PipelineError;
use crate::recipe::{CacheKey, Recipe};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Outcome of the dependency stage, distinguishing hit from build
#[derive(Debug, Clone)]
pub struct DependencyStageResult {
    pub artifacts: DependencyArtifactSet,
    pub cache_hit: bool,
}

pub struct DependencyStageBuilder {
    store: Arc<dyn CacheStore>,
    compiler: Arc<dyn Compiler>,
    work_dir: PathBuf,
    jobs: usize,
    timeout: Duration,
    key_locks: Mutex<HashMap<CacheKey, Arc<Mutex<()>>>>,
}

impl DependencyStageBuilder {
    pub fn new(
        store: Arc<dyn CacheStore>,
        compiler: Arc<dyn Compiler>,
        work_dir: PathBuf,
        jobs: usize,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            compiler,
            work_dir,
            jobs: jobs.max(1),
            timeout,
            key_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve the artifact set for a recipe: cache hit, or compile and
    /// store. Shared builders must go through the same instance for in-flight
    /// deduplication; cross-process races stay correct because store writes
    /// are atomic and idempotent per key.
    pub async fn build(
        &self,
        recipe: &Recipe,
        key: &CacheKey,
    ) -> Result<DependencyStageResult, PipelineError> {
        if let Some(artifacts) = self.store.get(key).await? {
            info!("Dependency cache hit for {key}");
            return Ok(DependencyStageResult {
                artifacts,
                cache_hit: true,
            });
        }

        let lock = self.lock_for(key).await;
        let result = {
            let _guard = lock.lock().await;
            self.build_locked(recipe, key).await
        };
        self.release_lock(key, &lock).await;
        result
    }

    async fn build_locked(
        &self,
        recipe: &Recipe,
        key: &CacheKey,
    ) -> Result<DependencyStageResult, PipelineError> {
        // Another in-flight builder may have populated the key while we
        // waited on the lock.
        if let Some(artifacts) = self.store.get(key).await? {
            debug!("Dependency cache populated while waiting for {key}");
            return Ok(DependencyStageResult {
                artifacts,
                cache_hit: true,
            });
        }

        info!(
            "Dependency cache miss for {key}, compiling {} dependencies",
            recipe.len()
        );

        let artifacts = tokio::time::timeout(self.timeout, self.compile_all(recipe, key))
            .await
            .map_err(|_| PipelineError::Timeout {
                stage: "dependency-build",
                budget: self.timeout,
            })??;

        let set = DependencyArtifactSet::new(key.clone(), artifacts);
        self.store.put(key, &set).await?;

        Ok(DependencyStageResult {
            artifacts: set,
            cache_hit: false,
        })
    }

    async fn lock_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        let mut locks = self.key_locks.lock().await;
        locks.entry(key.clone()).or_default().clone()
    }

    /// Drop the per-key lock once no other builder holds a clone, so the map
    /// does not accumulate an entry per key ever built.
    async fn release_lock(&self, key: &CacheKey, lock: &Arc<Mutex<()>>) {
        let mut locks = self.key_locks.lock().await;
        // The map entry plus our clone account for two references; more means
        // another builder still waits on this key. Holding the map mutex
        // keeps the count stable against concurrent lock_for calls.
        if Arc::strong_count(lock) <= 2 {
            locks.remove(key);
        }
    }

    async fn compile_all(
        &self,
        recipe: &Recipe,
        key: &CacheKey,
    ) -> Result<Vec<DependencyArtifact>, PipelineError> {
        let out_dir = self.work_dir.join(key.hex());
        tokio::fs::create_dir_all(&out_dir).await.map_err(|e| {
            PipelineError::DependencyBuild {
                name: "<workspace>".to_string(),
                source: crate::compiler::CompileFailure::Launch(e.to_string()),
            }
        })?;

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let mut workers: JoinSet<Result<DependencyArtifact, (String, PipelineError)>> =
            JoinSet::new();

        for (name, constraint) in recipe.dependencies() {
            let compiler = Arc::clone(&self.compiler);
            let semaphore = Arc::clone(&semaphore);
            let name = name.clone();
            let constraint = constraint.clone();
            let out_dir = out_dir.clone();

            workers.spawn(async move {
                // Semaphore is never closed while workers run
                let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
                compiler
                    .compile_dependency(&name, &constraint, &out_dir)
                    .await
                    .map_err(|source| {
                        (
                            name.clone(),
                            PipelineError::DependencyBuild { name, source },
                        )
                    })
            });
        }

        let mut artifacts = Vec::with_capacity(recipe.len());
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(artifact)) => artifacts.push(artifact),
                Ok(Err((name, err))) => {
                    warn!("Dependency '{name}' failed, aborting remaining workers");
                    workers.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    if join_err.is_cancelled() {
                        continue;
                    }
                    return Err(PipelineError::DependencyBuild {
                        name: "<worker>".to_string(),
                        source: crate::compiler::CompileFailure::Launch(join_err.to_string()),
                    });
                }
            }
        }

        Ok(artifacts)
    }
}
