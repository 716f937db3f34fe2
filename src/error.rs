//! Pipeline error taxonomy
//!
//! Every stage failure surfaces immediately with the failing stage
//! identified; nothing is swallowed or downgraded and nothing retries
//! internally. Each kind maps to a distinct process exit code.

use crate::cache::CacheStoreError;
use crate::compiler::CompileFailure;
use crate::package::PackagingError;
use crate::recipe::RecipeError;
use crate::scan::ScanError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Project tree unreadable or empty
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    /// Manifest parsing failed or duplicate declarations disagree
    #[error("Recipe build failed: {0}")]
    Recipe(#[from] RecipeError),

    /// A dependency failed to compile; fatal, nothing was cached
    #[error("Dependency build failed for '{name}': {source}")]
    DependencyBuild {
        name: String,
        #[source]
        source: CompileFailure,
    },

    /// Application stage invoked without a valid, matching artifact set
    #[error("Application stage requires a matching dependency artifact set: {0}")]
    MissingDependencyArtifact(String),

    /// Application compilation failed; not retryable without a source change
    #[error("Application build failed: {0}")]
    ApplicationBuild(#[source] CompileFailure),

    /// Final artifact missing or not executable
    #[error("Packaging failed: {0}")]
    Packaging(#[from] PackagingError),

    /// A stage exceeded its time budget; the cache was left untouched
    #[error("Stage '{stage}' exceeded its time budget of {budget:?}")]
    Timeout { stage: &'static str, budget: Duration },

    /// Transient store failure; retry the whole pipeline, never a stage
    #[error("Cache store failure: {0}")]
    CacheStore(#[from] CacheStoreError),
}

impl PipelineError {
    /// Stage name reported alongside the failure
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Scan(_) => "scan",
            Self::Recipe(_) => "recipe",
            Self::DependencyBuild { .. } => "dependency-build",
            Self::MissingDependencyArtifact(_) => "application-build",
            Self::ApplicationBuild(_) => "application-build",
            Self::Packaging(_) => "package",
            Self::Timeout { stage, .. } => stage,
            Self::CacheStore(_) => "cache-store",
        }
    }

    /// Distinct process exit code per failure kind
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Scan(_) => 10,
            Self::Recipe(RecipeError::Conflict { .. }) => 11,
            Self::Recipe(_) => 10,
            Self::DependencyBuild { .. } => 12,
            Self::MissingDependencyArtifact(_) => 13,
            Self::ApplicationBuild(_) => 14,
            Self::Packaging(_) => 15,
            Self::Timeout { .. } => 16,
            Self::CacheStore(_) => 17,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::path::PathBuf;

    #[test]
    fn test_exit_codes_are_distinct() {
        let errors = vec![
            PipelineError::Scan(ScanError::EmptyTree(PathBuf::from("/t"))),
            PipelineError::Recipe(RecipeError::Conflict {
                name: "libfoo".into(),
                existing: "1.0".into(),
                existing_path: PathBuf::from("a"),
                incoming: "2.0".into(),
                incoming_path: PathBuf::from("b"),
            }),
            PipelineError::DependencyBuild {
                name: "libfoo".into(),
                source: CompileFailure::Launch("gone".into()),
            },
            PipelineError::MissingDependencyArtifact("no set".into()),
            PipelineError::ApplicationBuild(CompileFailure::Launch("gone".into())),
            PipelineError::Packaging(PackagingError::MissingArtifact(PathBuf::from("/a"))),
            PipelineError::Timeout {
                stage: "dependency-build",
                budget: Duration::from_secs(1),
            },
            PipelineError::CacheStore(CacheStoreError::Io("down".into())),
        ];

        let codes: HashSet<i32> = errors.iter().map(|e| e.exit_code()).collect();
        assert_eq!(codes.len(), errors.len());
        assert!(codes.iter().all(|&c| c != 0));
    }

    #[test]
    fn test_conflict_has_own_code() {
        let conflict = PipelineError::Recipe(RecipeError::Conflict {
            name: "libfoo".into(),
            existing: "1.0".into(),
            existing_path: PathBuf::from("a"),
            incoming: "2.0".into(),
            incoming_path: PathBuf::from("b"),
        });
        let parse_like = PipelineError::Scan(ScanError::EmptyTree(PathBuf::from("/t")));
        assert_ne!(conflict.exit_code(), parse_like.exit_code());
    }

    #[test]
    fn test_stage_names() {
        let err = PipelineError::MissingDependencyArtifact("no set".into());
        assert_eq!(err.stage(), "application-build");
    }
}
