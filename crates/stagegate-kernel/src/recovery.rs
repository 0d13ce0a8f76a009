//! Recovery sweep for units left locked by an interrupted critical section
//!
//! The sweep only clears `locked` and parks the unit for a human with the
//! configured reason. It never changes `phase`. A second run finds nothing
//! to do.

use crate::audit::{self, AuditEvent};
use crate::conductor::Conductor;
use crate::error::GovernanceError;
use stagegate_artifact::WorkUnitId;

/// Outcome of one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub scanned: usize,
    pub recovered: Vec<WorkUnitId>,
}

#[derive(Debug, Clone)]
pub struct RecoverySweep {
    conductor: Conductor,
    reason: String,
}

impl RecoverySweep {
    pub fn new(conductor: Conductor, reason: impl Into<String>) -> Self {
        Self {
            conductor,
            reason: reason.into(),
        }
    }

    /// Recover every locked unit
    ///
    /// # Errors
    /// Returns store errors; units recovered before the error stay recovered
    pub async fn run(&self) -> Result<RecoveryReport, GovernanceError> {
        let units = self.conductor.store().list_work_units().await?;
        let mut report = RecoveryReport {
            scanned: units.len(),
            recovered: Vec::new(),
        };

        for unit in units.into_iter().filter(|u| u.locked) {
            let Some(snapshot) = self.conductor.recover(&unit.id, &self.reason).await? else {
                continue;
            };
            tracing::info!(work_unit = %unit.id, phase = %snapshot.phase, "Recovered stale lock");
            audit::emit(
                self.conductor.audit().as_ref(),
                AuditEvent::WorkUnitRecovered {
                    work_unit: unit.id.clone(),
                    phase: snapshot.phase,
                    reason: self.reason.clone(),
                },
            );
            report.recovered.push(unit.id);
        }

        if report.recovered.is_empty() {
            tracing::debug!(scanned = report.scanned, "Recovery sweep found nothing to do");
        }
        Ok(report)
    }
}
