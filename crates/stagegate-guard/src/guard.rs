//! Execution guard
//!
//! Runs a declared action list against a scope, strictly in order, and
//! stops at the first violation or effect failure.
//!
//! # Critical Invariant
//!
//! A guard runs once. `pending -> running -> {completed | failed}` with no
//! way back; the guard never retries an action and never repairs. Actions
//! after the halting one are not attempted and do not appear in the log.

use crate::action::ExecutionAction;
use crate::effector::ActionEffector;
use crate::log::{ActionFailure, ActionResult, ActionStatus, ExecutionLog, FailureClass, RunStatus};
use crate::scope::ExecutionScope;
use chrono::Utc;
use stagegate_artifact::{HashError, DEFAULT_EXCLUDED_FIELDS};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of a guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for GuardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GuardState::Pending => "pending",
            GuardState::Running => "running",
            GuardState::Completed => "completed",
            GuardState::Failed => "failed",
        })
    }
}

/// Errors that prevent a run from producing a log
///
/// Scope violations and effect failures are not errors here: they are
/// recorded in the returned [`ExecutionLog`].
#[derive(Debug, thiserror::Error)]
pub enum GuardError {
    #[error("execution guard already {0}; guards are single-use")]
    AlreadyRun(GuardState),

    #[error("failed to hash execution log: {0}")]
    Hash(#[from] HashError),
}

/// Single-use, halt-on-first-violation executor
pub struct ExecutionGuard {
    effector: Arc<dyn ActionEffector>,
    state: GuardState,
    excluded_fields: Vec<String>,
}

impl fmt::Debug for ExecutionGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionGuard")
            .field("state", &self.state)
            .field("excluded_fields", &self.excluded_fields)
            .finish_non_exhaustive()
    }
}

impl ExecutionGuard {
    /// Create a pending guard over an effector
    pub fn new(effector: Arc<dyn ActionEffector>) -> Self {
        Self {
            effector,
            state: GuardState::Pending,
            excluded_fields: DEFAULT_EXCLUDED_FIELDS.iter().map(ToString::to_string).collect(),
        }
    }

    /// Fields stripped when hashing the log
    #[must_use]
    pub fn with_excluded_fields(mut self, fields: Vec<String>) -> Self {
        self.excluded_fields = fields;
        self
    }

    #[inline]
    #[must_use]
    pub fn state(&self) -> GuardState {
        self.state
    }

    /// Run `actions` in order against `scope`
    ///
    /// # Errors
    /// Returns [`GuardError::AlreadyRun`] if this guard has left `pending`,
    /// or [`GuardError::Hash`] if the finished log cannot be hashed
    pub async fn run(
        &mut self,
        actions: &[ExecutionAction],
        scope: &ExecutionScope,
    ) -> Result<ExecutionLog, GuardError> {
        if self.state != GuardState::Pending {
            return Err(GuardError::AlreadyRun(self.state));
        }
        self.state = GuardState::Running;
        tracing::info!(actions = actions.len(), "Execution guard started");

        let mut log = ExecutionLog::new();
        let mut halted_at = None;

        for action in actions {
            match self.attempt(action, scope).await {
                Ok(()) => {
                    tracing::debug!(action = %action.id, target = %action.target, "Action applied");
                    log.record(Self::result(action, ActionStatus::Succeeded, None));
                }
                Err(failure) => {
                    tracing::warn!(
                        action = %action.id,
                        target = %action.target,
                        reason = %failure.message,
                        "Execution halted"
                    );
                    log.record(Self::result(action, ActionStatus::Failed, Some(failure)));
                    halted_at = Some(action.id.clone());
                    break;
                }
            }
        }

        let status = if halted_at.is_some() {
            RunStatus::Failed
        } else {
            RunStatus::Completed
        };
        self.state = match status {
            RunStatus::Failed => GuardState::Failed,
            _ => GuardState::Completed,
        };
        log.seal(status, halted_at, self.excluded_fields.as_slice())?;
        tracing::info!(state = %self.state, attempted = log.results().len(), "Execution guard finished");
        Ok(log)
    }

    async fn attempt(&self, action: &ExecutionAction, scope: &ExecutionScope) -> Result<(), ActionFailure> {
        let authorized = scope.authorize(action).map_err(|v| ActionFailure {
            class: FailureClass::ScopeViolation,
            message: v.to_string(),
        })?;

        if let Some(range) = authorized.range {
            let lines = self
                .effector
                .line_count(&authorized.target)
                .await
                .map_err(|e| ActionFailure {
                    class: FailureClass::EffectFailed,
                    message: e.to_string(),
                })?;
            ExecutionScope::check_range(&authorized.target, range, lines).map_err(|v| ActionFailure {
                class: FailureClass::ScopeViolation,
                message: v.to_string(),
            })?;
        }

        self.effector.apply(&authorized).await.map_err(|e| ActionFailure {
            class: FailureClass::EffectFailed,
            message: e.to_string(),
        })
    }

    fn result(action: &ExecutionAction, status: ActionStatus, error: Option<ActionFailure>) -> ActionResult {
        ActionResult {
            action_id: action.id.clone(),
            target: action.target.clone(),
            kind: action.kind,
            status,
            error,
            recorded_at: Utc::now(),
        }
    }
}
