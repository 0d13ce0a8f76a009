//! Append-only execution log
//!
//! Results are appended in action order while the run is in progress.
//! Sealing sets the final status and computes `log_hash` exactly once;
//! a sealed log accepts nothing further.

use crate::action::{ActionId, ActionKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagegate_artifact::{canonical_hash, ContentHash, HashError};

/// Outcome of one attempted action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Succeeded,
    Failed,
}

/// Why an action failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Rejected by the declared scope before any effect
    ScopeViolation,
    /// The effect itself errored
    EffectFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionFailure {
    pub class: FailureClass,
    pub message: String,
}

/// Record of one attempted action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_id: ActionId,
    pub target: String,
    pub kind: ActionKind,
    pub status: ActionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ActionFailure>,
    pub recorded_at: DateTime<Utc>,
}

/// Overall status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    InProgress,
    Completed,
    Failed,
}

/// Hashed view: result list plus overall status
#[derive(Serialize)]
struct LogDigest<'a> {
    results: &'a [ActionResult],
    status: RunStatus,
}

/// Ordered, auditable record of an execution run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLog {
    results: Vec<ActionResult>,
    status: RunStatus,
    halted_at: Option<ActionId>,
    log_hash: Option<ContentHash>,
}

impl Default for ExecutionLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionLog {
    #[must_use]
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            status: RunStatus::InProgress,
            halted_at: None,
            log_hash: None,
        }
    }

    /// Append a result; ignored once the log is sealed
    pub(crate) fn record(&mut self, result: ActionResult) {
        if self.status == RunStatus::InProgress {
            self.results.push(result);
        }
    }

    /// Finish the run and hash the log
    pub(crate) fn seal<S: AsRef<str>>(
        &mut self,
        status: RunStatus,
        halted_at: Option<ActionId>,
        excluded_fields: &[S],
    ) -> Result<(), HashError> {
        if self.status != RunStatus::InProgress {
            return Ok(());
        }
        let digest = canonical_hash(
            &LogDigest {
                results: &self.results,
                status,
            },
            excluded_fields,
        )?;
        self.status = status;
        self.halted_at = halted_at;
        self.log_hash = Some(digest);
        Ok(())
    }

    /// Recompute the digest and compare with the sealed one
    ///
    /// # Errors
    /// Returns error if the log cannot be serialized
    pub fn verify_hash<S: AsRef<str>>(&self, excluded_fields: &[S]) -> Result<bool, HashError> {
        let Some(recorded) = self.log_hash else {
            return Ok(false);
        };
        let computed = canonical_hash(
            &LogDigest {
                results: &self.results,
                status: self.status,
            },
            excluded_fields,
        )?;
        Ok(computed == recorded)
    }

    #[must_use]
    pub fn results(&self) -> &[ActionResult] {
        &self.results
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    #[must_use]
    pub fn halted_at(&self) -> Option<&ActionId> {
        self.halted_at.as_ref()
    }

    #[must_use]
    pub fn log_hash(&self) -> Option<&ContentHash> {
        self.log_hash.as_ref()
    }

    /// The failed result, if the run halted
    #[must_use]
    pub fn failure(&self) -> Option<&ActionResult> {
        self.results.iter().find(|r| r.status == ActionStatus::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, at: DateTime<Utc>) -> ActionResult {
        ActionResult {
            action_id: ActionId::new(id),
            target: "src/a.rs".into(),
            kind: ActionKind::Create,
            status: ActionStatus::Succeeded,
            error: None,
            recorded_at: at,
        }
    }

    #[test]
    fn timestamps_do_not_affect_log_hash() {
        let t0 = Utc::now();
        let t1 = t0 + chrono::Duration::seconds(90);

        let mut a = ExecutionLog::new();
        a.record(result("a1", t0));
        a.seal(RunStatus::Completed, None, &["recorded_at"]).unwrap();

        let mut b = ExecutionLog::new();
        b.record(result("a1", t1));
        b.seal(RunStatus::Completed, None, &["recorded_at"]).unwrap();

        assert_eq!(a.log_hash(), b.log_hash());
        assert!(a.verify_hash(&["recorded_at"]).unwrap());
    }

    #[test]
    fn status_is_part_of_hash() {
        let t = Utc::now();
        let mut a = ExecutionLog::new();
        a.record(result("a1", t));
        a.seal(RunStatus::Completed, None, &["recorded_at"]).unwrap();

        let mut b = ExecutionLog::new();
        b.record(result("a1", t));
        b.seal(RunStatus::Failed, Some(ActionId::new("a1")), &["recorded_at"]).unwrap();

        assert_ne!(a.log_hash(), b.log_hash());
    }

    #[test]
    fn sealed_log_is_append_only() {
        let mut log = ExecutionLog::new();
        log.record(result("a1", Utc::now()));
        log.seal(RunStatus::Completed, None, &["recorded_at"]).unwrap();
        let hash = log.log_hash().copied();

        log.record(result("a2", Utc::now()));
        log.seal(RunStatus::Failed, None, &["recorded_at"]).unwrap();

        assert_eq!(log.results().len(), 1);
        assert_eq!(log.status(), RunStatus::Completed);
        assert_eq!(log.log_hash().copied(), hash);
    }

    #[test]
    fn unsealed_log_does_not_verify() {
        let log = ExecutionLog::new();
        assert!(!log.verify_hash(&["recorded_at"]).unwrap());
    }
}
