//! Pipeline state machine
//!
//! Terminal states are `Packaged` and failure; there is no automatic retry
//! across stages.

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineState {
    Scanning,
    RecipeBuilt,
    KeyDerived,
    DependencyCacheHit,
    DependencyBuilt,
    ApplicationBuilt,
    Packaged,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Packaged)
    }

    /// Legal successors of this state
    pub fn can_transition_to(&self, next: PipelineState) -> bool {
        use PipelineState::*;
        matches!(
            (self, next),
            (Scanning, RecipeBuilt)
                | (RecipeBuilt, KeyDerived)
                | (KeyDerived, DependencyCacheHit)
                | (KeyDerived, DependencyBuilt)
                | (DependencyCacheHit, ApplicationBuilt)
                | (DependencyBuilt, ApplicationBuilt)
                | (ApplicationBuilt, Packaged)
        )
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Scanning => "scanning",
            Self::RecipeBuilt => "recipe-built",
            Self::KeyDerived => "key-derived",
            Self::DependencyCacheHit => "dependency-cache-hit",
            Self::DependencyBuilt => "dependency-built",
            Self::ApplicationBuilt => "application-built",
            Self::Packaged => "packaged",
        };
        write!(f, "{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        use PipelineState::*;
        assert!(Scanning.can_transition_to(RecipeBuilt));
        assert!(RecipeBuilt.can_transition_to(KeyDerived));
        assert!(KeyDerived.can_transition_to(DependencyCacheHit));
        assert!(KeyDerived.can_transition_to(DependencyBuilt));
        assert!(DependencyCacheHit.can_transition_to(ApplicationBuilt));
        assert!(ApplicationBuilt.can_transition_to(Packaged));
    }

    #[test]
    fn test_no_backward_or_skipping_transitions() {
        use PipelineState::*;
        assert!(!Scanning.can_transition_to(Packaged));
        assert!(!DependencyBuilt.can_transition_to(KeyDerived));
        assert!(!RecipeBuilt.can_transition_to(ApplicationBuilt));
    }

    #[test]
    fn test_packaged_is_terminal() {
        assert!(PipelineState::Packaged.is_terminal());
        assert!(!PipelineState::Scanning.is_terminal());
        assert!(!PipelineState::Packaged.can_transition_to(PipelineState::Scanning));
    }
}
