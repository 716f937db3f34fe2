//! Staged build pipeline

pub mod orchestrator;
pub mod state;

pub use orchestrator::{BuildPipeline, BuildReport, PreparedRecipe};
pub use state::PipelineState;
