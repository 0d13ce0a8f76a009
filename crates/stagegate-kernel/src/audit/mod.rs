//! Audit events and sinks
//!
//! Events are fire-and-forget: a sink failure is logged and never fails
//! the governing operation. [`AuditLog`] keeps a SHA-256 hash-chained copy
//! of every event so tampering with the history is detectable.

use crate::types::Phase;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use stagegate_artifact::{ArtifactId, ArtifactKind, ContentHash, WorkUnitId};
use stagegate_guard::ActionId;
use std::sync::Arc;
use uuid::Uuid;

/// Discrete governance notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    PhaseTransitioned {
        work_unit: WorkUnitId,
        from: Phase,
        to: Phase,
        actor: String,
    },
    ArtifactSubmitted {
        work_unit: WorkUnitId,
        artifact: ArtifactId,
        kind: ArtifactKind,
        content_hash: ContentHash,
    },
    ArtifactApproved {
        work_unit: WorkUnitId,
        artifact: ArtifactId,
        kind: ArtifactKind,
        approver: String,
    },
    ArtifactRejected {
        work_unit: WorkUnitId,
        artifact: ArtifactId,
        kind: ArtifactKind,
        reason: String,
    },
    ExecutionHalted {
        work_unit: WorkUnitId,
        action: ActionId,
        reason: String,
    },
    WorkUnitRecovered {
        work_unit: WorkUnitId,
        phase: Phase,
        reason: String,
    },
}

impl AuditEvent {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            AuditEvent::PhaseTransitioned { .. } => "phase_transitioned",
            AuditEvent::ArtifactSubmitted { .. } => "artifact_submitted",
            AuditEvent::ArtifactApproved { .. } => "artifact_approved",
            AuditEvent::ArtifactRejected { .. } => "artifact_rejected",
            AuditEvent::ExecutionHalted { .. } => "execution_halted",
            AuditEvent::WorkUnitRecovered { .. } => "work_unit_recovered",
        }
    }

    #[must_use]
    pub fn work_unit(&self) -> &WorkUnitId {
        match self {
            AuditEvent::PhaseTransitioned { work_unit, .. }
            | AuditEvent::ArtifactSubmitted { work_unit, .. }
            | AuditEvent::ArtifactApproved { work_unit, .. }
            | AuditEvent::ArtifactRejected { work_unit, .. }
            | AuditEvent::ExecutionHalted { work_unit, .. }
            | AuditEvent::WorkUnitRecovered { work_unit, .. } => work_unit,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("failed to encode audit event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audit log integrity violation at record {seq}")]
    IntegrityViolation { seq: u64 },

    #[error("audit sink unavailable: {0}")]
    Unavailable(String),
}

/// Receiver of audit events
pub trait AuditSink: Send + Sync {
    /// Record one event
    ///
    /// # Errors
    /// Returns error if the event could not be recorded
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Emit to `sink`, logging and swallowing any failure
pub(crate) fn emit(sink: &dyn AuditSink, event: AuditEvent) {
    if let Err(e) = sink.emit(&event) {
        tracing::warn!(event = event.name(), work_unit = %event.work_unit(), error = %e, "Audit sink failed");
    }
}

/// Drops every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn emit(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Writes every event as a structured tracing record
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let payload = serde_json::to_string(event)?;
        tracing::info!(
            target: "stagegate::audit",
            event = event.name(),
            work_unit = %event.work_unit(),
            payload = %payload,
            "audit"
        );
        Ok(())
    }
}

/// Forwards to several sinks
///
/// Every sink sees every event; the first failure is reported after all
/// sinks ran.
#[derive(Default, Clone)]
pub struct FanoutAuditSink {
    sinks: Vec<Arc<dyn AuditSink>>,
}

impl FanoutAuditSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl AuditSink for FanoutAuditSink {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let mut first_err = None;
        for sink in &self.sinks {
            if let Err(e) = sink.emit(event) {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}

/// One hash-chained audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub seq: u64,
    pub record_id: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub event: AuditEvent,
    pub prev_hash: [u8; 32],
    pub hash: [u8; 32],
}

/// In-memory append-only audit log
#[derive(Debug, Default)]
pub struct AuditLog {
    inner: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, linking it to the previous record
    ///
    /// # Errors
    /// Returns error if the event cannot be encoded
    pub fn append(&self, event: AuditEvent) -> Result<u64, AuditError> {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |r| r.hash);
        let mut record = AuditRecord {
            seq: guard.len() as u64,
            record_id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            event,
            prev_hash,
            hash: [0u8; 32],
        };
        record.hash = compute_hash(&record)?;
        let seq = record.seq;
        guard.push(record);
        Ok(seq)
    }

    #[must_use]
    pub fn records(&self) -> Vec<AuditRecord> {
        self.inner.lock().clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<AuditEvent> {
        self.inner.lock().iter().map(|r| r.event.clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Digest of the most recent record
    #[must_use]
    pub fn head(&self) -> Option<[u8; 32]> {
        self.inner.lock().last().map(|r| r.hash)
    }

    /// Walk the chain and recompute every hash
    ///
    /// # Errors
    /// Returns [`AuditError::IntegrityViolation`] at the first broken link
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for record in guard.iter() {
            if record.prev_hash != prev || record.hash != compute_hash(record)? {
                return Err(AuditError::IntegrityViolation { seq: record.seq });
            }
            prev = record.hash;
        }
        Ok(())
    }
}

impl AuditSink for AuditLog {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        self.append(event.clone()).map(|_| ())
    }
}

fn compute_hash(record: &AuditRecord) -> Result<[u8; 32], AuditError> {
    let mut hasher = Sha256::new();
    hasher.update(record.seq.to_le_bytes());
    hasher.update(record.record_id.as_bytes());
    hasher.update(record.recorded_at.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&record.event)?);
    hasher.update([0]);
    hasher.update(record.prev_hash);
    Ok(hasher.finalize().into())
}
