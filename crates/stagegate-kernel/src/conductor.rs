//! Conductor: the per-work-unit state machine
//!
//! Owns phase transitions, the `locked` mutual-exclusion flag and the
//! human-pause flag. Every write goes through the store's compare-and-swap
//! on `(phase, locked, awaiting_human)`.
//!
//! # Critical Invariant
//!
//! `transition` is not guarded by `locked`; it is the terminal step of a
//! critical section. It writes against the phase it read, so of two
//! concurrent transitions on one unit at most one succeeds, and the loser
//! gets [`GovernanceError::TransitionConflict`]. Transitions are never
//! retried.

use crate::audit::{self, AuditEvent, AuditSink};
use crate::error::GovernanceError;
use crate::state_machine::{self, StateViolation};
use crate::store::{ArtifactStore, StoreError};
use crate::types::{Phase, StateSnapshot, WorkUnit};
use chrono::Utc;
use stagegate_artifact::WorkUnitId;
use std::sync::Arc;

/// Re-read attempts for flag updates that lose a race with an unrelated write
const FLAG_UPDATE_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct Conductor {
    store: Arc<dyn ArtifactStore>,
    audit: Arc<dyn AuditSink>,
    max_repair_cycles: u32,
}

impl std::fmt::Debug for Conductor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conductor")
            .field("max_repair_cycles", &self.max_repair_cycles)
            .finish_non_exhaustive()
    }
}

impl Conductor {
    pub fn new(store: Arc<dyn ArtifactStore>, audit: Arc<dyn AuditSink>, max_repair_cycles: u32) -> Self {
        Self {
            store,
            audit,
            max_repair_cycles,
        }
    }

    #[inline]
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ArtifactStore> {
        &self.store
    }

    #[inline]
    #[must_use]
    pub fn audit(&self) -> &Arc<dyn AuditSink> {
        &self.audit
    }

    /// Phases reachable from `phase` in one step
    #[must_use]
    pub fn legal_successors(phase: Phase) -> Vec<Phase> {
        state_machine::legal_successors(phase)
    }

    /// Create a work unit at `idea`, unlocked and not paused
    ///
    /// # Errors
    /// Returns [`GovernanceError::WorkUnitExists`] if the id is taken
    pub async fn initialize(&self, id: &WorkUnitId) -> Result<StateSnapshot, GovernanceError> {
        let unit = WorkUnit::new(id.clone());
        let snapshot = unit.snapshot();
        self.store.insert_work_unit(unit).await?;
        tracing::info!(work_unit = %id, "Work unit initialized");
        Ok(snapshot)
    }

    /// Move to `target`, recording `actor` as the last actor
    ///
    /// # Errors
    /// - [`GovernanceError::StateViolation`] if `target` is not a legal
    ///   successor or the repair-cycle limit is exhausted
    /// - [`GovernanceError::TransitionConflict`] if the unit changed between
    ///   read and write
    pub async fn transition(
        &self,
        id: &WorkUnitId,
        target: Phase,
        actor: &str,
    ) -> Result<StateSnapshot, GovernanceError> {
        self.transition_with(id, target, actor, None).await
    }

    /// Move any non-terminal unit to `failed`
    ///
    /// # Errors
    /// Same as [`Conductor::transition`]
    pub async fn fail(&self, id: &WorkUnitId, reason: &str, actor: &str) -> Result<StateSnapshot, GovernanceError> {
        self.transition_with(id, Phase::Failed, actor, Some(reason)).await
    }

    async fn transition_with(
        &self,
        id: &WorkUnitId,
        target: Phase,
        actor: &str,
        failure_reason: Option<&str>,
    ) -> Result<StateSnapshot, GovernanceError> {
        let current = self.store.get_work_unit(id).await?;
        let from = current.phase;

        if let Err(violation) = state_machine::validate_transition(from, target) {
            tracing::warn!(work_unit = %id, %from, to = %target, "Illegal transition rejected");
            return Err(GovernanceError::state(id, violation));
        }

        let mut next = current.clone();
        if state_machine::is_repair_edge(from, target) {
            if current.repair_cycles >= self.max_repair_cycles {
                tracing::warn!(work_unit = %id, max = self.max_repair_cycles, "Repair cycle limit reached");
                return Err(GovernanceError::state(
                    id,
                    StateViolation::RepairLimit {
                        max: self.max_repair_cycles,
                    },
                ));
            }
            next.repair_cycles += 1;
        }
        next.phase = target;
        next.last_actor = Some(actor.to_string());
        if let Some(reason) = failure_reason {
            next.failure_reason = Some(reason.to_string());
        }
        next.updated_at = Utc::now();

        match self.store.put_work_unit(next.clone(), current.guarded()).await {
            Ok(()) => {}
            Err(StoreError::Conflict { .. }) => {
                tracing::warn!(work_unit = %id, phase = %from, "Concurrent transition lost");
                return Err(GovernanceError::TransitionConflict {
                    work_unit: id.clone(),
                    phase: from,
                });
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(work_unit = %id, %from, to = %target, actor, "Phase transitioned");
        audit::emit(
            self.audit.as_ref(),
            AuditEvent::PhaseTransitioned {
                work_unit: id.clone(),
                from,
                to: target,
                actor: actor.to_string(),
            },
        );
        Ok(next.snapshot())
    }

    /// Acquire the unit's mutual-exclusion flag
    ///
    /// # Errors
    /// Returns [`GovernanceError::LockConflict`] if the unit is already locked
    pub async fn lock(&self, id: &WorkUnitId) -> Result<StateSnapshot, GovernanceError> {
        let unit = self
            .update(id, |unit| {
                if unit.locked {
                    tracing::warn!(work_unit = %unit.id, "Lock refused: already held");
                    return Err(GovernanceError::LockConflict(unit.id.clone()));
                }
                let mut next = unit.clone();
                next.locked = true;
                Ok(Some(next))
            })
            .await?;
        tracing::debug!(work_unit = %id, "Locked");
        Ok(unit.snapshot())
    }

    /// Release the lock; unlocking an unlocked unit is a no-op
    ///
    /// # Errors
    /// Returns store errors only
    pub async fn unlock(&self, id: &WorkUnitId) -> Result<StateSnapshot, GovernanceError> {
        let unit = self
            .update(id, |unit| {
                if !unit.locked {
                    return Ok(None);
                }
                let mut next = unit.clone();
                next.locked = false;
                Ok(Some(next))
            })
            .await?;
        tracing::debug!(work_unit = %id, "Unlocked");
        Ok(unit.snapshot())
    }

    /// Mark the unit as waiting for a human decision
    ///
    /// # Errors
    /// Returns store errors only
    pub async fn pause_for_human(&self, id: &WorkUnitId, reason: &str) -> Result<StateSnapshot, GovernanceError> {
        let unit = self
            .update(id, |unit| {
                let mut next = unit.clone();
                next.awaiting_human = true;
                next.pause_reason = Some(reason.to_string());
                Ok(Some(next))
            })
            .await?;
        tracing::info!(work_unit = %id, reason, "Paused for human");
        Ok(unit.snapshot())
    }

    /// Clear the human-pause flag and reason
    ///
    /// # Errors
    /// Returns store errors only
    pub async fn resume_after_human(&self, id: &WorkUnitId) -> Result<StateSnapshot, GovernanceError> {
        let unit = self
            .update(id, |unit| {
                if !unit.awaiting_human && unit.pause_reason.is_none() {
                    return Ok(None);
                }
                let mut next = unit.clone();
                next.awaiting_human = false;
                next.pause_reason = None;
                Ok(Some(next))
            })
            .await?;
        tracing::info!(work_unit = %id, "Resumed after human");
        Ok(unit.snapshot())
    }

    /// Read-only view of the unit
    ///
    /// # Errors
    /// Returns [`GovernanceError::WorkUnitNotFound`] for unknown ids
    pub async fn get_state_snapshot(&self, id: &WorkUnitId) -> Result<StateSnapshot, GovernanceError> {
        Ok(self.store.get_work_unit(id).await?.snapshot())
    }

    /// Clear a stale lock and park the unit for a human, leaving the phase alone
    ///
    /// Returns `None` if the unit was not locked.
    pub(crate) async fn recover(&self, id: &WorkUnitId, reason: &str) -> Result<Option<StateSnapshot>, GovernanceError> {
        let mut changed = false;
        let unit = self
            .update(id, |unit| {
                if !unit.locked {
                    changed = false;
                    return Ok(None);
                }
                changed = true;
                let mut next = unit.clone();
                next.locked = false;
                next.awaiting_human = true;
                next.pause_reason = Some(reason.to_string());
                Ok(Some(next))
            })
            .await?;
        Ok(changed.then(|| unit.snapshot()))
    }

    /// Read, apply `change`, and compare-and-swap the result
    ///
    /// `change` returns `Ok(None)` when no write is needed. A lost swap is
    /// re-read and re-applied a bounded number of times.
    async fn update<F>(&self, id: &WorkUnitId, mut change: F) -> Result<WorkUnit, GovernanceError>
    where
        F: FnMut(&WorkUnit) -> Result<Option<WorkUnit>, GovernanceError> + Send,
    {
        let mut last_phase = None;
        for _ in 0..FLAG_UPDATE_ATTEMPTS {
            let current = self.store.get_work_unit(id).await?;
            last_phase = Some(current.phase);
            let Some(mut next) = change(&current)? else {
                return Ok(current);
            };
            next.updated_at = Utc::now();
            match self.store.put_work_unit(next.clone(), current.guarded()).await {
                Ok(()) => return Ok(next),
                Err(StoreError::Conflict { .. }) => {
                    tracing::debug!(work_unit = %id, "Flag update raced; re-reading");
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(GovernanceError::TransitionConflict {
            work_unit: id.clone(),
            phase: last_phase.unwrap_or(Phase::Idea),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditLog, NullAuditSink};
    use crate::store::InMemoryStore;

    fn conductor() -> Conductor {
        Conductor::new(Arc::new(InMemoryStore::new()), Arc::new(NullAuditSink), 1)
    }

    async fn walk_to(c: &Conductor, id: &WorkUnitId, target: Phase) {
        let mut phase = c.get_state_snapshot(id).await.unwrap().phase;
        while phase != target {
            let next = Conductor::legal_successors(phase)[0];
            phase = c.transition(id, next, "walker").await.unwrap().phase;
        }
    }

    #[tokio::test]
    async fn initialize_twice_fails() {
        let c = conductor();
        let id = WorkUnitId::new("wu");
        let snap = c.initialize(&id).await.unwrap();
        assert_eq!(snap.phase, Phase::Idea);
        assert!(!snap.locked && !snap.awaiting_human);
        assert!(matches!(
            c.initialize(&id).await,
            Err(GovernanceError::WorkUnitExists(_))
        ));
    }

    #[tokio::test]
    async fn transition_records_actor_and_emits() {
        let log = Arc::new(AuditLog::new());
        let c = Conductor::new(Arc::new(InMemoryStore::new()), log.clone(), 3);
        let id = WorkUnitId::new("wu");
        c.initialize(&id).await.unwrap();

        let snap = c.transition(&id, Phase::BasePromptReady, "approver-1").await.unwrap();
        assert_eq!(snap.last_actor.as_deref(), Some("approver-1"));
        assert_eq!(log.len(), 1);
    }

    #[tokio::test]
    async fn transition_succeeds_while_locked() {
        let c = conductor();
        let id = WorkUnitId::new("wu");
        c.initialize(&id).await.unwrap();
        c.lock(&id).await.unwrap();
        let snap = c.transition(&id, Phase::BasePromptReady, "stage").await.unwrap();
        assert!(snap.locked);
    }

    #[tokio::test]
    async fn skipping_a_phase_is_a_state_violation() {
        let c = conductor();
        let id = WorkUnitId::new("wu");
        c.initialize(&id).await.unwrap();
        let err = c.transition(&id, Phase::Planning, "stage").await.unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::StateViolation {
                violation: StateViolation::IllegalTransition { .. },
                ..
            }
        ));
        assert_eq!(c.get_state_snapshot(&id).await.unwrap().phase, Phase::Idea);
    }

    #[tokio::test]
    async fn repair_cycles_are_bounded() {
        let c = conductor();
        let id = WorkUnitId::new("wu");
        c.initialize(&id).await.unwrap();
        walk_to(&c, &id, Phase::Verifying).await;

        c.transition(&id, Phase::VerificationFailed, "verifier").await.unwrap();
        let snap = c.transition(&id, Phase::Building, "repair").await.unwrap();
        assert_eq!(snap.repair_cycles, 1);

        c.transition(&id, Phase::Verifying, "builder").await.unwrap();
        c.transition(&id, Phase::VerificationFailed, "verifier").await.unwrap();
        let err = c.transition(&id, Phase::Building, "repair").await.unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::StateViolation {
                violation: StateViolation::RepairLimit { max: 1 },
                ..
            }
        ));
    }

    #[tokio::test]
    async fn fail_records_reason_and_is_terminal() {
        let c = conductor();
        let id = WorkUnitId::new("wu");
        c.initialize(&id).await.unwrap();
        let snap = c.fail(&id, "generator unavailable", "ops").await.unwrap();
        assert_eq!(snap.phase, Phase::Failed);
        assert_eq!(snap.failure_reason.as_deref(), Some("generator unavailable"));
        assert!(c.fail(&id, "again", "ops").await.is_err());
    }

    #[tokio::test]
    async fn lock_is_exclusive_and_unlock_idempotent() {
        let c = conductor();
        let id = WorkUnitId::new("wu");
        c.initialize(&id).await.unwrap();
        c.lock(&id).await.unwrap();
        assert!(matches!(c.lock(&id).await, Err(GovernanceError::LockConflict(_))));
        assert!(!c.unlock(&id).await.unwrap().locked);
        assert!(!c.unlock(&id).await.unwrap().locked);
        c.lock(&id).await.unwrap();
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_flag_and_reason() {
        let c = conductor();
        let id = WorkUnitId::new("wu");
        c.initialize(&id).await.unwrap();
        let snap = c.pause_for_human(&id, "review base prompt").await.unwrap();
        assert!(snap.awaiting_human);
        assert_eq!(snap.pause_reason.as_deref(), Some("review base prompt"));
        assert!(!snap.locked);

        let snap = c.resume_after_human(&id).await.unwrap();
        assert!(!snap.awaiting_human);
        assert!(snap.pause_reason.is_none());
    }

    #[tokio::test]
    async fn unknown_unit_is_reported() {
        let c = conductor();
        let id = WorkUnitId::new("ghost");
        assert!(matches!(
            c.get_state_snapshot(&id).await,
            Err(GovernanceError::WorkUnitNotFound(_))
        ));
        assert!(matches!(c.lock(&id).await, Err(GovernanceError::WorkUnitNotFound(_))));
    }
}
