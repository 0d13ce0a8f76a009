//! Stage contracts
//!
//! Each stage is plain data: the phase it runs in, the phase its approval
//! advances to, and the upstream kinds it may read.

use crate::types::Phase;
use stagegate_artifact::{ArtifactKind, DEFAULT_EXCLUDED_FIELDS};
use std::collections::BTreeMap;

/// Declared capabilities of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageContract {
    pub kind: ArtifactKind,
    pub requires_phase: Phase,
    pub advances_to: Phase,
    pub dependencies: Vec<ArtifactKind>,
    /// Fields stripped before hashing this stage's content
    pub excluded_fields: Vec<String>,
}

impl StageContract {
    pub fn new(kind: ArtifactKind, requires_phase: Phase, advances_to: Phase, dependencies: &[ArtifactKind]) -> Self {
        Self {
            kind,
            requires_phase,
            advances_to,
            dependencies: dependencies.to_vec(),
            excluded_fields: DEFAULT_EXCLUDED_FIELDS.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Contracts keyed by artifact kind
#[derive(Debug, Clone, Default)]
pub struct StageRegistry {
    contracts: BTreeMap<ArtifactKind, StageContract>,
}

impl StageRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven planning stages
    #[must_use]
    pub fn standard() -> Self {
        use ArtifactKind::*;
        Self::new()
            .register(StageContract::new(BasePrompt, Phase::Idea, Phase::BasePromptReady, &[]))
            .register(StageContract::new(
                MasterPlan,
                Phase::BasePromptReady,
                Phase::Planning,
                &[BasePrompt],
            ))
            .register(StageContract::new(
                ScreenInventory,
                Phase::Planning,
                Phase::ScreensDefined,
                &[BasePrompt, MasterPlan],
            ))
            .register(StageContract::new(
                UserFlows,
                Phase::ScreensDefined,
                Phase::FlowsDefined,
                &[MasterPlan, ScreenInventory],
            ))
            .register(StageContract::new(
                Designs,
                Phase::FlowsDefined,
                Phase::DesignsReady,
                &[ScreenInventory, UserFlows],
            ))
            .register(StageContract::new(
                ProjectRules,
                Phase::DesignsReady,
                Phase::RulesLocked,
                &[MasterPlan, Designs],
            ))
            .register(StageContract::new(
                BuildPrompts,
                Phase::RulesLocked,
                Phase::BuildPromptsReady,
                &[ProjectRules, ScreenInventory, UserFlows],
            ))
    }

    /// Replace the excluded-field list of every contract
    #[must_use]
    pub fn with_excluded_fields(mut self, fields: &[String]) -> Self {
        for contract in self.contracts.values_mut() {
            contract.excluded_fields = fields.to_vec();
        }
        self
    }

    #[must_use]
    pub fn register(mut self, contract: StageContract) -> Self {
        self.contracts.insert(contract.kind, contract);
        self
    }

    #[must_use]
    pub fn get(&self, kind: ArtifactKind) -> Option<&StageContract> {
        self.contracts.get(&kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageContract> {
        self.contracts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_chains_phases() {
        let registry = StageRegistry::standard();
        let contracts: Vec<_> = registry.iter().collect();
        assert_eq!(contracts.len(), 7);
        for pair in contracts.windows(2) {
            assert_eq!(pair[0].advances_to, pair[1].requires_phase);
        }
        assert_eq!(contracts[0].requires_phase, Phase::Idea);
        assert_eq!(contracts[6].advances_to, Phase::BuildPromptsReady);
    }

    #[test]
    fn dependencies_only_point_upstream() {
        for contract in StageRegistry::standard().iter() {
            assert!(contract.dependencies.iter().all(|d| *d < contract.kind), "{}", contract.kind);
        }
    }

    #[test]
    fn excluded_fields_can_be_overridden() {
        let registry = StageRegistry::standard().with_excluded_fields(&["nonce".to_string()]);
        let contract = registry.get(ArtifactKind::Designs).unwrap();
        assert_eq!(contract.excluded_fields, vec!["nonce".to_string()]);
    }
}
