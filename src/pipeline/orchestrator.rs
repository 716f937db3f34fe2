//! Build pipeline orchestration
//!
//! Sequences the stages strictly: scan, recipe, key derivation, dependency
//! stage, application stage, packaging. Each stage consumes the previous
//! stage's output and no stage reaches back upstream. Errors surface
//! immediately with the failing stage identified; cancellation (dropping the
//! returned future) aborts the current and later stages but never rolls back
//! committed cache entries.

use super::state::PipelineState;
use crate::build::{ApplicationStageBuilder, DependencyStageBuilder};
use crate::cache::CacheStore;
use crate::compiler::{ApplicationArtifact, Compiler};
use crate::config::BuildConfig;
use crate::error::PipelineError;
use crate::package::{ArtifactPackager, PackagedImage};
use crate::recipe::{CacheKey, Recipe, RecipeBuilder};
use crate::scan::{ManifestScanner, ProjectTree};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Output of the `prepare` phase: everything needed to address the cache
#[derive(Debug, Clone)]
pub struct PreparedRecipe {
    pub recipe: Recipe,
    pub key: CacheKey,
}

/// Success-terminal summary of a full pipeline run
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub recipe: Recipe,
    pub key: CacheKey,
    pub dependency_cache_hit: bool,
    pub artifact: ApplicationArtifact,
    pub image: PackagedImage,
    pub elapsed: Duration,
}

pub struct BuildPipeline {
    deps_stage: DependencyStageBuilder,
    app_stage: ApplicationStageBuilder,
}

impl BuildPipeline {
    pub fn new(
        store: Arc<dyn CacheStore>,
        compiler: Arc<dyn Compiler>,
        config: &BuildConfig,
    ) -> Self {
        let deps_stage = DependencyStageBuilder::new(
            store,
            Arc::clone(&compiler),
            config.work_dir.clone(),
            config.jobs,
            config.stage_timeout,
        );
        let app_stage =
            ApplicationStageBuilder::new(compiler, config.work_dir.clone(), config.stage_timeout);
        Self {
            deps_stage,
            app_stage,
        }
    }

    /// Scan the tree and derive the cache-addressable recipe. Pure read on
    /// the project tree.
    pub fn prepare(&self, tree: &ProjectTree) -> Result<PreparedRecipe, PipelineError> {
        let mut state = PipelineState::Scanning;
        info!("Pipeline state: {state}");

        let scan = ManifestScanner::scan(tree)?;
        state = Self::advance(state, PipelineState::RecipeBuilt);

        let recipe = RecipeBuilder::build(&scan)?;
        state = Self::advance(state, PipelineState::KeyDerived);

        let key = CacheKey::derive(&recipe);
        debug!("Derived cache key {key} in state {state}");

        Ok(PreparedRecipe { recipe, key })
    }

    /// Run the full pipeline. A pre-built recipe (from `prepare`) skips
    /// re-scanning; otherwise the tree is prepared in place.
    pub async fn execute(
        &self,
        tree: &ProjectTree,
        prepared: Option<PreparedRecipe>,
        layout_root: &Path,
    ) -> Result<BuildReport, PipelineError> {
        let start = Instant::now();
        info!("Starting build pipeline for: {}", tree.root().display());

        let PreparedRecipe { recipe, key } = match prepared {
            Some(prepared) => prepared,
            None => self.prepare(tree)?,
        };

        let state = PipelineState::KeyDerived;
        let deps = self.deps_stage.build(&recipe, &key).await?;
        let state = Self::advance(
            state,
            if deps.cache_hit {
                PipelineState::DependencyCacheHit
            } else {
                PipelineState::DependencyBuilt
            },
        );

        let artifact = self.app_stage.build(tree, &key, &deps.artifacts).await?;
        let state = Self::advance(state, PipelineState::ApplicationBuilt);

        let image = ArtifactPackager::package(&artifact, layout_root)?;
        let state = Self::advance(state, PipelineState::Packaged);

        let elapsed = start.elapsed();
        info!(
            "Pipeline complete in {:?} (terminal state: {state}, cache {})",
            elapsed,
            if deps.cache_hit { "hit" } else { "miss" }
        );

        Ok(BuildReport {
            recipe,
            key,
            dependency_cache_hit: deps.cache_hit,
            artifact,
            image,
            elapsed,
        })
    }

    fn advance(from: PipelineState, to: PipelineState) -> PipelineState {
        debug_assert!(
            from.can_transition_to(to),
            "illegal transition {from} -> {to}"
        );
        info!("Pipeline state: {from} -> {to}");
        to
    }
}
