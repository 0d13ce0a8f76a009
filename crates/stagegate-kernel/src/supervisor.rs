//! Guarded execution on behalf of a work unit
//!
//! Wraps one [`ExecutionGuard`] run in the unit's lock. A halted run parks
//! the unit for a human with the halting action in the pause reason. The
//! supervisor never retries and never repairs.

use crate::audit::{self, AuditEvent};
use crate::conductor::Conductor;
use crate::error::GovernanceError;
use crate::state_machine::StateViolation;
use crate::types::StateSnapshot;
use stagegate_artifact::WorkUnitId;
use stagegate_guard::{ActionEffector, ExecutionAction, ExecutionGuard, ExecutionLog, ExecutionScope, RunStatus};
use std::sync::Arc;

#[derive(Clone)]
pub struct ExecutionSupervisor {
    conductor: Conductor,
    effector: Arc<dyn ActionEffector>,
    excluded_fields: Vec<String>,
}

impl std::fmt::Debug for ExecutionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionSupervisor")
            .field("conductor", &self.conductor)
            .field("excluded_fields", &self.excluded_fields)
            .finish_non_exhaustive()
    }
}

impl ExecutionSupervisor {
    pub fn new(conductor: Conductor, effector: Arc<dyn ActionEffector>, excluded_fields: Vec<String>) -> Self {
        Self {
            conductor,
            effector,
            excluded_fields,
        }
    }

    /// Run `actions` for `work_unit` inside `scope`
    ///
    /// A halted run is not an error: the returned log has status `failed`
    /// and the unit is left unlocked and awaiting a human. Use
    /// [`GovernanceError::from_halted_log`] to turn it into one.
    ///
    /// # Errors
    /// - [`GovernanceError::StateViolation`] if the unit is awaiting a human
    /// - [`GovernanceError::LockConflict`] if the unit is locked
    pub async fn execute(
        &self,
        work_unit: &WorkUnitId,
        actions: &[ExecutionAction],
        scope: &ExecutionScope,
    ) -> Result<ExecutionLog, GovernanceError> {
        let state = self.conductor.get_state_snapshot(work_unit).await?;
        Self::not_awaiting(work_unit, &state)?;

        let held = self.conductor.lock(work_unit).await?;
        let outcome = match Self::not_awaiting(work_unit, &held) {
            Ok(()) => self.run_locked(work_unit, actions, scope).await,
            Err(e) => Err(e),
        };
        let released = self.conductor.unlock(work_unit).await;
        let log = outcome?;
        released?;

        if let Some(failed) = log.failure() {
            let reason = failed
                .error
                .as_ref()
                .map_or_else(String::new, |e| e.message.clone());
            audit::emit(
                self.conductor.audit().as_ref(),
                AuditEvent::ExecutionHalted {
                    work_unit: work_unit.clone(),
                    action: failed.action_id.clone(),
                    reason,
                },
            );
        }
        Ok(log)
    }

    fn not_awaiting(work_unit: &WorkUnitId, state: &StateSnapshot) -> Result<(), GovernanceError> {
        if state.awaiting_human {
            tracing::warn!(work_unit = %work_unit, "Execution refused: awaiting human");
            return Err(GovernanceError::state(
                work_unit,
                StateViolation::AwaitingHuman {
                    reason: state.pause_reason.clone().unwrap_or_default(),
                },
            ));
        }
        Ok(())
    }

    async fn run_locked(
        &self,
        work_unit: &WorkUnitId,
        actions: &[ExecutionAction],
        scope: &ExecutionScope,
    ) -> Result<ExecutionLog, GovernanceError> {
        let mut guard = ExecutionGuard::new(self.effector.clone()).with_excluded_fields(self.excluded_fields.clone());
        let log = guard.run(actions, scope).await?;

        if log.status() == RunStatus::Failed {
            let action = log.halted_at().map_or_else(|| "unknown action".to_string(), ToString::to_string);
            tracing::warn!(work_unit = %work_unit, %action, "Execution halted; pausing for human");
            self.conductor
                .pause_for_human(work_unit, &format!("execution halted at {action}"))
                .await?;
        } else {
            tracing::info!(work_unit = %work_unit, actions = log.results().len(), "Execution completed");
        }
        Ok(log)
    }
}
