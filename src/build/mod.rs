//! Build stages
//!
//! Two isolated stages: the dependency stage compiles the recipe's graph (or
//! restores it from cache), the application stage compiles the program
//! against those warmed artifacts. The split is what makes repeated builds
//! skip redundant dependency recompilation.

pub mod app;
pub mod deps;

pub use app::ApplicationStageBuilder;
pub use deps::{DependencyStageBuilder, DependencyStageResult};
