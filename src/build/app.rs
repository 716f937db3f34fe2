//! Application stage builder
//!
//! Compiles application source against a warmed dependency artifact set. This
//! stage never re-invokes dependency compilation: calling it without a set
//! that matches the current recipe's key is an orchestration error.

use crate::compiler::{ApplicationArtifact, Compiler, DependencyArtifactSet};
use crate::error::PipelineError;
use crate::recipe::CacheKey;
use crate::scan::ProjectTree;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct ApplicationStageBuilder {
    compiler: Arc<dyn Compiler>,
    work_dir: PathBuf,
    timeout: Duration,
}

impl ApplicationStageBuilder {
    pub fn new(compiler: Arc<dyn Compiler>, work_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            compiler,
            work_dir,
            timeout,
        }
    }

    pub async fn build(
        &self,
        tree: &ProjectTree,
        expected_key: &CacheKey,
        deps: &DependencyArtifactSet,
    ) -> Result<ApplicationArtifact, PipelineError> {
        if deps.key != *expected_key {
            return Err(PipelineError::MissingDependencyArtifact(format!(
                "artifact set keyed {} does not match recipe key {expected_key}",
                deps.key
            )));
        }

        let out_dir = self.work_dir.join("app").join(expected_key.hex());
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|e| {
                PipelineError::ApplicationBuild(crate::compiler::CompileFailure::Launch(
                    e.to_string(),
                ))
            })?;

        info!(
            "Building application from {} against {} dependency artifacts",
            tree.root().display(),
            deps.len()
        );

        let artifact = tokio::time::timeout(
            self.timeout,
            self.compiler.compile_application(tree, deps, &out_dir),
        )
        .await
        .map_err(|_| PipelineError::Timeout {
            stage: "application-build",
            budget: self.timeout,
        })?
        .map_err(PipelineError::ApplicationBuild)?;

        Ok(artifact)
    }
}
