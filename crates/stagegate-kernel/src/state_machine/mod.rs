//! Phase transition rules
//!
//! The edge set is linear from `idea` to `verifying`, branches to
//! `completed` or `verification_failed`, allows `verification_failed ->
//! building` as a repair cycle, and lets every non-terminal phase fall to
//! `failed`.

use crate::types::Phase;
use stagegate_artifact::ArtifactKind;

/// Why a phase-dependent request was refused
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateViolation {
    #[error("cannot move from {from} to {to}; legal successors: {}", join(.legal))]
    IllegalTransition {
        from: Phase,
        to: Phase,
        legal: Vec<Phase>,
    },

    #[error("stage {stage} cannot run: work unit is in phase {current}, expected {expected}")]
    WrongPhase {
        stage: ArtifactKind,
        current: Phase,
        expected: Phase,
    },

    #[error("work unit is awaiting a human decision ({reason})")]
    AwaitingHuman { reason: String },

    #[error("repair cycle limit of {max} reached")]
    RepairLimit { max: u32 },
}

fn join(phases: &[Phase]) -> String {
    if phases.is_empty() {
        return "none".to_string();
    }
    phases.iter().map(|p| p.as_str()).collect::<Vec<_>>().join(", ")
}

/// Phases reachable from `from` in one step
#[must_use]
pub fn legal_successors(from: Phase) -> Vec<Phase> {
    use Phase::*;
    match from {
        Idea => vec![BasePromptReady, Failed],
        BasePromptReady => vec![Planning, Failed],
        Planning => vec![ScreensDefined, Failed],
        ScreensDefined => vec![FlowsDefined, Failed],
        FlowsDefined => vec![DesignsReady, Failed],
        DesignsReady => vec![RulesLocked, Failed],
        RulesLocked => vec![BuildPromptsReady, Failed],
        BuildPromptsReady => vec![Building, Failed],
        Building => vec![Verifying, Failed],
        Verifying => vec![Completed, VerificationFailed, Failed],
        VerificationFailed => vec![Building, Failed],
        Completed | Failed => vec![],
    }
}

/// Whether `from -> to` starts a repair cycle
#[inline]
#[must_use]
pub fn is_repair_edge(from: Phase, to: Phase) -> bool {
    from == Phase::VerificationFailed && to == Phase::Building
}

/// Validate a single edge
///
/// # Errors
/// Returns [`StateViolation::IllegalTransition`] if `to` is not a legal
/// successor of `from`
pub fn validate_transition(from: Phase, to: Phase) -> Result<(), StateViolation> {
    let legal = legal_successors(from);
    if legal.contains(&to) {
        Ok(())
    } else {
        Err(StateViolation::IllegalTransition { from, to, legal })
    }
}
