//! Artifact lifecycle
//!
//! produce -> hash -> await approval -> approve | reject
//!
//! `produce_and_submit` is one critical section bracketed by
//! [`Conductor::lock`] and [`Conductor::unlock`]; the unlock runs on every
//! exit path. `approve` and `reject` are the only ways an awaiting artifact
//! changes state.

use crate::audit::{self, AuditEvent};
use crate::conductor::Conductor;
use crate::error::GovernanceError;
use crate::isolation::{ContextIsolationLoader, IsolatedContext};
use crate::stage::{StageContract, StageRegistry};
use crate::state_machine::StateViolation;
use crate::types::StateSnapshot;
use stagegate_artifact::{
    verify_chain, Artifact, ArtifactContent, ArtifactId, ArtifactKind, ArtifactStatus, Decision, HashChainError,
    WorkUnitId,
};

/// Error returned by a generation delegate
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct GenerationError(pub String);

impl GenerationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// External content generator for one stage
///
/// Treated as unreliable and non-deterministic; failures are not retried.
#[async_trait::async_trait]
pub trait GenerationDelegate: Send + Sync {
    async fn generate(&self, context: &IsolatedContext) -> Result<ArtifactContent, GenerationError>;

    /// Recorded as `produced_by` on the artifact
    fn name(&self) -> &str {
        "generator"
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactLifecycle {
    conductor: Conductor,
    loader: ContextIsolationLoader,
    registry: StageRegistry,
}

impl ArtifactLifecycle {
    pub fn new(conductor: Conductor, registry: StageRegistry) -> Self {
        let loader = ContextIsolationLoader::new(conductor.store().clone());
        Self {
            conductor,
            loader,
            registry,
        }
    }

    #[inline]
    #[must_use]
    pub fn registry(&self) -> &StageRegistry {
        &self.registry
    }

    #[inline]
    #[must_use]
    pub fn loader(&self) -> &ContextIsolationLoader {
        &self.loader
    }

    fn contract(&self, kind: ArtifactKind) -> Result<&StageContract, GovernanceError> {
        self.registry.get(kind).ok_or(GovernanceError::StageNotRegistered(kind))
    }

    /// Generate, hash and submit a new artifact for `stage`
    ///
    /// The stage's declared dependencies form the isolated context handed to
    /// `generate`. On success the unit is left paused for a human and
    /// unlocked. On failure after the lock was taken the unit is left
    /// unlocked and not paused, still in the same phase.
    ///
    /// # Errors
    /// - [`GovernanceError::StateViolation`] if the unit is in the wrong
    ///   phase or awaiting a human
    /// - [`GovernanceError::LockConflict`] if another operation holds the lock
    /// - [`GovernanceError::ContextIsolationViolation`] for a missing or
    ///   unapproved dependency
    /// - [`GovernanceError::GenerationFailure`] if the delegate fails or
    ///   returns content for another stage
    /// - [`GovernanceError::InvalidContent`] if required fields are empty
    /// - [`GovernanceError::HashChainViolation`] if an upstream changed while
    ///   generating
    pub async fn produce_and_submit(
        &self,
        work_unit: &WorkUnitId,
        stage: ArtifactKind,
        generate: &dyn GenerationDelegate,
    ) -> Result<Artifact, GovernanceError> {
        let contract = self.contract(stage)?;
        let state = self.conductor.get_state_snapshot(work_unit).await?;
        Self::ready_for(work_unit, contract, &state)?;

        let held = self.conductor.lock(work_unit).await?;
        let outcome = match Self::ready_for(work_unit, contract, &held) {
            Ok(()) => self.submit_locked(work_unit, contract, generate).await,
            Err(e) => Err(e),
        };
        let released = self.conductor.unlock(work_unit).await;

        let artifact = outcome?;
        released?;

        tracing::info!(
            work_unit = %work_unit,
            %stage,
            artifact = %artifact.id(),
            hash = %artifact.content_hash().short(),
            "Artifact submitted"
        );
        audit::emit(
            self.conductor.audit().as_ref(),
            AuditEvent::ArtifactSubmitted {
                work_unit: work_unit.clone(),
                artifact: artifact.id(),
                kind: stage,
                content_hash: *artifact.content_hash(),
            },
        );
        Ok(artifact)
    }

    /// Whether `state` lets `contract`'s stage start generating
    ///
    /// Checked before locking and again on the snapshot `lock` returns;
    /// only the second check is authoritative.
    fn ready_for(work_unit: &WorkUnitId, contract: &StageContract, state: &StateSnapshot) -> Result<(), GovernanceError> {
        let stage = contract.kind;
        if state.awaiting_human {
            tracing::warn!(work_unit = %work_unit, %stage, "Generation refused: awaiting human");
            return Err(GovernanceError::state(
                work_unit,
                StateViolation::AwaitingHuman {
                    reason: state.pause_reason.clone().unwrap_or_default(),
                },
            ));
        }
        if state.phase != contract.requires_phase {
            tracing::warn!(work_unit = %work_unit, %stage, phase = %state.phase, "Generation refused: wrong phase");
            return Err(GovernanceError::state(
                work_unit,
                StateViolation::WrongPhase {
                    stage,
                    current: state.phase,
                    expected: contract.requires_phase,
                },
            ));
        }
        Ok(())
    }

    async fn submit_locked(
        &self,
        work_unit: &WorkUnitId,
        contract: &StageContract,
        generate: &dyn GenerationDelegate,
    ) -> Result<Artifact, GovernanceError> {
        let stage = contract.kind;
        let context = self
            .loader
            .load_isolated_context(work_unit, &contract.dependencies)
            .await?;

        let content = generate.generate(&context).await.map_err(|e| {
            tracing::warn!(work_unit = %work_unit, %stage, error = %e, "Generation failed");
            GovernanceError::GenerationFailure {
                stage,
                reason: e.to_string(),
            }
        })?;
        if content.kind() != stage {
            return Err(GovernanceError::GenerationFailure {
                stage,
                reason: format!("delegate returned {} content", content.kind()),
            });
        }

        let declared = context.upstream_hashes();
        let kinds: Vec<ArtifactKind> = declared.keys().copied().collect();
        let actual = self.loader.current_hashes(work_unit, &kinds).await?;
        verify_chain(&declared, &actual).map_err(|source| GovernanceError::HashChainViolation {
            work_unit: work_unit.clone(),
            source,
        })?;

        let artifact = Artifact::submit(
            work_unit.clone(),
            content,
            declared,
            contract.excluded_fields.as_slice(),
            generate.name(),
        )
        .map_err(|e| GovernanceError::from_artifact(stage, e))?;
        tracing::debug!(work_unit = %work_unit, %stage, hash = %artifact.content_hash(), "Content hashed");

        self.conductor.store().insert_artifact(artifact.clone()).await?;
        self.conductor
            .pause_for_human(work_unit, &format!("{stage} awaiting approval"))
            .await?;
        Ok(artifact)
    }

    /// Approve an awaiting artifact and advance the unit
    ///
    /// # Errors
    /// - [`GovernanceError::ImmutabilityViolation`] unless the artifact is
    ///   awaiting approval
    /// - [`GovernanceError::StateViolation`] if the unit left the stage's phase
    pub async fn approve(&self, artifact_id: ArtifactId, approver: &str) -> Result<Artifact, GovernanceError> {
        let artifact = self.awaiting(artifact_id).await?;
        let work_unit = artifact.work_unit_id().clone();
        let contract = self.contract(artifact.kind())?;

        let state = self.conductor.get_state_snapshot(&work_unit).await?;
        if state.phase != contract.requires_phase {
            return Err(GovernanceError::state(
                &work_unit,
                StateViolation::WrongPhase {
                    stage: contract.kind,
                    current: state.phase,
                    expected: contract.requires_phase,
                },
            ));
        }

        let approved = self
            .conductor
            .store()
            .finalize_artifact(artifact_id, Decision::approve(approver))
            .await?;
        self.conductor.resume_after_human(&work_unit).await?;
        self.conductor
            .transition(&work_unit, contract.advances_to, approver)
            .await?;

        tracing::info!(work_unit = %work_unit, stage = %contract.kind, artifact = %artifact_id, approver, "Artifact approved");
        audit::emit(
            self.conductor.audit().as_ref(),
            AuditEvent::ArtifactApproved {
                work_unit,
                artifact: artifact_id,
                kind: contract.kind,
                approver: approver.to_string(),
            },
        );
        Ok(approved)
    }

    /// Reject an awaiting artifact; the record is kept
    ///
    /// The unit is left unlocked and not paused so a fresh
    /// [`ArtifactLifecycle::produce_and_submit`] can run in the same phase.
    ///
    /// # Errors
    /// Returns [`GovernanceError::ImmutabilityViolation`] unless the artifact
    /// is awaiting approval
    pub async fn reject(&self, artifact_id: ArtifactId, reason: &str) -> Result<Artifact, GovernanceError> {
        let artifact = self.awaiting(artifact_id).await?;
        let work_unit = artifact.work_unit_id().clone();

        let rejected = self
            .conductor
            .store()
            .finalize_artifact(artifact_id, Decision::reject(reason))
            .await?;
        self.conductor.resume_after_human(&work_unit).await?;
        self.conductor.unlock(&work_unit).await?;

        tracing::info!(work_unit = %work_unit, stage = %artifact.kind(), artifact = %artifact_id, reason, "Artifact rejected");
        audit::emit(
            self.conductor.audit().as_ref(),
            AuditEvent::ArtifactRejected {
                work_unit,
                artifact: artifact_id,
                kind: artifact.kind(),
                reason: reason.to_string(),
            },
        );
        Ok(rejected)
    }

    /// Re-check a stored artifact's content hash and upstream chain
    ///
    /// # Errors
    /// Returns [`GovernanceError::HashChainViolation`] if the content no
    /// longer matches its hash or an upstream hash differs from the stored one
    pub async fn verify_artifact(&self, artifact_id: ArtifactId) -> Result<(), GovernanceError> {
        let artifact = self.conductor.store().get_artifact(artifact_id).await?;
        let work_unit = artifact.work_unit_id().clone();
        let contract = self.contract(artifact.kind())?;
        let violation = |source: HashChainError| GovernanceError::HashChainViolation {
            work_unit: work_unit.clone(),
            source,
        };

        artifact
            .verify_content(contract.excluded_fields.as_slice())
            .map_err(violation)?;

        let kinds: Vec<ArtifactKind> = artifact.upstream_hashes().keys().copied().collect();
        let actual = self.loader.current_hashes(&work_unit, &kinds).await?;
        verify_chain(artifact.upstream_hashes(), &actual).map_err(violation)?;

        tracing::debug!(work_unit = %work_unit, artifact = %artifact_id, "Artifact verified");
        Ok(())
    }

    /// Every artifact of `stage` for the unit, oldest first
    ///
    /// # Errors
    /// Returns store errors only
    pub async fn history(&self, work_unit: &WorkUnitId, stage: ArtifactKind) -> Result<Vec<Artifact>, GovernanceError> {
        Ok(self.conductor.store().list_artifacts(work_unit, stage).await?)
    }

    async fn awaiting(&self, artifact_id: ArtifactId) -> Result<Artifact, GovernanceError> {
        let artifact = self.conductor.store().get_artifact(artifact_id).await?;
        if artifact.status() != ArtifactStatus::AwaitingApproval {
            tracing::warn!(artifact = %artifact_id, status = %artifact.status(), "Decision on finalized artifact refused");
            return Err(GovernanceError::ImmutabilityViolation {
                artifact: artifact_id,
                status: artifact.status(),
            });
        }
        Ok(artifact)
    }
}
