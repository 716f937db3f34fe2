//! Compiler abstraction
//!
//! The pipeline never invokes a toolchain directly; it talks to a [`Compiler`]
//! so the dependency and application stages can be exercised against a real
//! process-based toolchain or a mock with invocation counters.

pub mod cargo;
pub mod mock;
pub mod process;

use crate::recipe::{CacheKey, DependencyConstraint};
use crate::scan::ProjectTree;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use cargo::CargoCompiler;
pub use mock::MockCompiler;
pub use process::ProcessCompiler;

/// Why a compilation step failed
#[derive(Debug, Error)]
pub enum CompileFailure {
    /// The compiler process could not be launched
    #[error("Failed to launch compiler: {0}")]
    Launch(String),

    /// The compiler ran and reported failure
    #[error("Compiler failed (exit status {status}): {stderr}")]
    Failed { status: i32, stderr: String },

    /// The compiler reported success but produced no output artifact
    #[error("Compiler produced no output at {0}")]
    MissingOutput(PathBuf),
}

/// Compiled output for a single dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyArtifact {
    pub name: String,
    pub version: String,
    /// Location of the compiled unit
    pub object: PathBuf,
}

/// All dependency artifacts for one cache key, created atomically
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyArtifactSet {
    pub key: CacheKey,
    pub artifacts: Vec<DependencyArtifact>,
}

impl DependencyArtifactSet {
    pub fn new(key: CacheKey, mut artifacts: Vec<DependencyArtifact>) -> Self {
        // Stable ordering regardless of worker completion order
        artifacts.sort_by(|a, b| a.name.cmp(&b.name));
        Self { key, artifacts }
    }

    pub fn len(&self) -> usize {
        self.artifacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// The final executable, tied to the dependency set it consumed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationArtifact {
    pub binary: PathBuf,
    pub dependency_key: CacheKey,
}

/// Toolchain seam used by both build stages
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Compile one dependency in isolation from application source, placing
    /// its output under `out_dir`.
    async fn compile_dependency(
        &self,
        name: &str,
        constraint: &DependencyConstraint,
        out_dir: &Path,
    ) -> Result<DependencyArtifact, CompileFailure>;

    /// Compile the application against pre-built dependency artifacts,
    /// producing the final executable under `out_dir`.
    async fn compile_application(
        &self,
        tree: &ProjectTree,
        deps: &DependencyArtifactSet,
        out_dir: &Path,
    ) -> Result<ApplicationArtifact, CompileFailure>;
}
