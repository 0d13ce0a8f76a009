//! Governance error taxonomy
//!
//! Every error is reported to the immediate caller. Nothing in the kernel
//! retries on its own.

use crate::state_machine::StateViolation;
use crate::store::StoreError;
use crate::types::Phase;
use stagegate_artifact::{
    ArtifactError, ArtifactId, ArtifactKind, ArtifactStatus, ContentError, HashChainError, HashError, WorkUnitId,
};
use stagegate_guard::{ActionId, ExecutionLog, FailureClass, GuardError};
use std::fmt;

/// Why a declared dependency could not be loaded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationFailure {
    Missing,
    NotApproved(ArtifactStatus),
    Unhashed,
}

impl fmt::Display for IsolationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IsolationFailure::Missing => f.write_str("has not been produced"),
            IsolationFailure::NotApproved(status) => write!(f, "is {status}, expected approved"),
            IsolationFailure::Unhashed => f.write_str("has no content hash"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GovernanceError {
    /// Illegal transition or wrong phase for the requested operation
    #[error("work unit {work_unit}: {violation}")]
    StateViolation {
        work_unit: WorkUnitId,
        #[source]
        violation: StateViolation,
    },

    #[error("work unit {0} is already locked")]
    LockConflict(WorkUnitId),

    /// Optimistic check lost against a concurrent writer
    #[error("work unit {work_unit} changed concurrently while in phase {phase}")]
    TransitionConflict { work_unit: WorkUnitId, phase: Phase },

    #[error("work unit {work_unit}: dependency {dependency} {failure}")]
    ContextIsolationViolation {
        work_unit: WorkUnitId,
        dependency: ArtifactKind,
        failure: IsolationFailure,
    },

    #[error("hash chain violation on work unit {work_unit}: {source}")]
    HashChainViolation {
        work_unit: WorkUnitId,
        #[source]
        source: HashChainError,
    },

    #[error("artifact {artifact} is {status} and can no longer change")]
    ImmutabilityViolation { artifact: ArtifactId, status: ArtifactStatus },

    /// An execution run halted; carries the action it stopped at
    #[error("execution halted at {action}: {detail}")]
    ScopeViolation {
        action: ActionId,
        class: FailureClass,
        detail: String,
    },

    #[error("generation for stage {stage} failed: {reason}")]
    GenerationFailure { stage: ArtifactKind, reason: String },

    #[error("stage {stage} produced invalid content: {source}")]
    InvalidContent {
        stage: ArtifactKind,
        #[source]
        source: ContentError,
    },

    #[error("no stage contract registered for {0}")]
    StageNotRegistered(ArtifactKind),

    #[error("work unit {0} already exists")]
    WorkUnitExists(WorkUnitId),

    #[error("work unit {0} not found")]
    WorkUnitNotFound(WorkUnitId),

    #[error("artifact {0} not found")]
    ArtifactNotFound(ArtifactId),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("hash error: {0}")]
    Hash(#[from] HashError),

    #[error("execution guard error: {0}")]
    Guard(#[from] GuardError),
}

impl GovernanceError {
    /// The caller may correct its request and try again
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            GovernanceError::HashChainViolation { .. }
            | GovernanceError::Store(_)
            | GovernanceError::Hash(_)
            | GovernanceError::Guard(_) => false,
            GovernanceError::StateViolation { .. }
            | GovernanceError::LockConflict(_)
            | GovernanceError::TransitionConflict { .. }
            | GovernanceError::ContextIsolationViolation { .. }
            | GovernanceError::ImmutabilityViolation { .. }
            | GovernanceError::ScopeViolation { .. }
            | GovernanceError::GenerationFailure { .. }
            | GovernanceError::InvalidContent { .. }
            | GovernanceError::StageNotRegistered(_)
            | GovernanceError::WorkUnitExists(_)
            | GovernanceError::WorkUnitNotFound(_)
            | GovernanceError::ArtifactNotFound(_) => true,
        }
    }

    /// Only a human can resolve this
    #[must_use]
    pub fn requires_human(&self) -> bool {
        matches!(
            self,
            GovernanceError::HashChainViolation { .. } | GovernanceError::ScopeViolation { .. }
        )
    }

    /// Error for a halted execution log, `None` if the run completed
    #[must_use]
    pub fn from_halted_log(log: &ExecutionLog) -> Option<Self> {
        let failed = log.failure()?;
        let (class, detail) = failed
            .error
            .as_ref()
            .map_or((FailureClass::EffectFailed, String::new()), |e| (e.class, e.message.clone()));
        Some(GovernanceError::ScopeViolation {
            action: failed.action_id.clone(),
            class,
            detail,
        })
    }

    pub(crate) fn state(work_unit: &WorkUnitId, violation: StateViolation) -> Self {
        GovernanceError::StateViolation {
            work_unit: work_unit.clone(),
            violation,
        }
    }

    pub(crate) fn from_artifact(stage: ArtifactKind, err: ArtifactError) -> Self {
        match err {
            ArtifactError::Immutable { id, status } => GovernanceError::ImmutabilityViolation { artifact: id, status },
            ArtifactError::InvalidContent(source) => GovernanceError::InvalidContent { stage, source },
            ArtifactError::Hash(e) => GovernanceError::Hash(e),
        }
    }
}

impl From<StoreError> for GovernanceError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::WorkUnitExists(id) => GovernanceError::WorkUnitExists(id),
            StoreError::WorkUnitNotFound(id) => GovernanceError::WorkUnitNotFound(id),
            StoreError::ArtifactNotFound(id) => GovernanceError::ArtifactNotFound(id),
            StoreError::AlreadyFinal { id, status } => GovernanceError::ImmutabilityViolation { artifact: id, status },
            StoreError::Conflict { id, found, .. } => GovernanceError::TransitionConflict {
                work_unit: id,
                phase: found.phase,
            },
            other @ (StoreError::ArtifactExists(_) | StoreError::Backend(_)) => GovernanceError::Store(other),
        }
    }
}
