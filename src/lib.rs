//! prebake - dependency-cache-aware staged build orchestrator
//!
//! This library splits a build into two independently cacheable phases:
//! compiling the dependency graph and compiling the application. Dependency
//! declarations are distilled into a canonical *recipe*, fingerprinted into a
//! *cache key*, and the compiled dependency artifacts are stored under that
//! key so repeated builds with unchanged declarations skip dependency
//! recompilation entirely while still producing a freshly built, minimally
//! packaged executable.
//!
//! # Core Concepts
//!
//! - **Recipe**: canonical, order-independent summary of a project's
//!   dependency declarations, independent of application source
//! - **Cache Key**: deterministic sha256 fingerprint of a recipe, the address
//!   of a dependency artifact set in the cache store
//! - **Staged build**: dependency stage (cache-aware) then application stage,
//!   finished by packaging the single executable into a runtime layout
//!
//! # Example Usage
//!
//! ```ignore
//! use prebake::{BuildConfig, BuildPipeline, CargoCompiler, DiskCacheStore, ProjectTree};
//! use std::sync::Arc;
//!
//! async fn build(path: &str) -> Result<(), prebake::PipelineError> {
//!     let config = BuildConfig::default();
//!     let store = Arc::new(DiskCacheStore::new(config.cache_dir.clone()));
//!     let compiler = Arc::new(CargoCompiler::new());
//!     let pipeline = BuildPipeline::new(store, compiler, &config);
//!
//!     let report = pipeline
//!         .execute(&ProjectTree::new(path), None, "rootfs".as_ref())
//!         .await?;
//!     println!("executable: {}", report.image.entrypoint.display());
//!     Ok(())
//! }
//! ```
//!
//! # Project Structure
//!
//! - [`scan`]: manifest scanning over a project tree
//! - [`recipe`]: recipe construction and cache key derivation
//! - [`cache`]: injected cache store implementations
//! - [`compiler`]: toolchain seam (cargo-backed, command-template and mock)
//! - [`build`]: dependency and application stage builders
//! - [`package`]: runtime layout assembly
//! - [`pipeline`]: the staged state machine tying it all together

// Public modules
pub mod build;
pub mod cache;
pub mod cli;
pub mod compiler;
pub mod config;
pub mod error;
pub mod package;
pub mod pipeline;
pub mod recipe;
pub mod scan;

// Re-export key types for convenient access
pub use cache::{CacheStore, CacheStoreError, DiskCacheStore, MemoryCacheStore};
pub use compiler::{
    ApplicationArtifact, CargoCompiler, CompileFailure, Compiler, DependencyArtifact,
    DependencyArtifactSet, MockCompiler, ProcessCompiler,
};
pub use config::{BuildConfig, ConfigError};
pub use error::PipelineError;
pub use package::{ArtifactPackager, PackagedImage, PackagingError, ENTRYPOINT_PATH};
pub use pipeline::{BuildPipeline, BuildReport, PipelineState, PreparedRecipe};
pub use recipe::{CacheKey, DependencyConstraint, Recipe, RecipeBuilder, RecipeError};
pub use scan::{ManifestScanner, ProjectTree, ScanError, ScanResult};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
