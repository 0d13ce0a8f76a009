//! Artifact kinds produced by pipeline stages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of artifact a stage produces
///
/// Ordering follows pipeline order, so maps keyed by kind iterate
/// upstream-first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    BasePrompt,
    MasterPlan,
    ScreenInventory,
    UserFlows,
    Designs,
    ProjectRules,
    BuildPrompts,
}

impl ArtifactKind {
    /// All kinds in pipeline order
    pub const ALL: [ArtifactKind; 7] = [
        ArtifactKind::BasePrompt,
        ArtifactKind::MasterPlan,
        ArtifactKind::ScreenInventory,
        ArtifactKind::UserFlows,
        ArtifactKind::Designs,
        ArtifactKind::ProjectRules,
        ArtifactKind::BuildPrompts,
    ];

    /// Stable snake_case identifier
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::BasePrompt => "base_prompt",
            ArtifactKind::MasterPlan => "master_plan",
            ArtifactKind::ScreenInventory => "screen_inventory",
            ArtifactKind::UserFlows => "user_flows",
            ArtifactKind::Designs => "designs",
            ArtifactKind::ProjectRules => "project_rules",
            ArtifactKind::BuildPrompts => "build_prompts",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownKind(s.to_string()))
    }
}

/// Parse failure for [`ArtifactKind`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown artifact kind: {0}")]
pub struct UnknownKind(pub String);
