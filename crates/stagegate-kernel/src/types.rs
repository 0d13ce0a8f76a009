//! Core kernel types
//!
//! [`Phase`] is the closed lifecycle of a work unit. [`WorkUnit`] is the
//! stored record; stages only ever see it through [`StateSnapshot`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stagegate_artifact::WorkUnitId;
use std::fmt;
use std::str::FromStr;

/// Lifecycle phase of a work unit
///
/// Declaration order is pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idea,
    BasePromptReady,
    Planning,
    ScreensDefined,
    FlowsDefined,
    DesignsReady,
    RulesLocked,
    BuildPromptsReady,
    Building,
    Verifying,
    Completed,
    VerificationFailed,
    Failed,
}

impl Phase {
    /// Every phase, in declaration order
    pub const ALL: [Phase; 13] = [
        Phase::Idea,
        Phase::BasePromptReady,
        Phase::Planning,
        Phase::ScreensDefined,
        Phase::FlowsDefined,
        Phase::DesignsReady,
        Phase::RulesLocked,
        Phase::BuildPromptsReady,
        Phase::Building,
        Phase::Verifying,
        Phase::Completed,
        Phase::VerificationFailed,
        Phase::Failed,
    ];

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Phase::Idea => "idea",
            Phase::BasePromptReady => "base_prompt_ready",
            Phase::Planning => "planning",
            Phase::ScreensDefined => "screens_defined",
            Phase::FlowsDefined => "flows_defined",
            Phase::DesignsReady => "designs_ready",
            Phase::RulesLocked => "rules_locked",
            Phase::BuildPromptsReady => "build_prompts_ready",
            Phase::Building => "building",
            Phase::Verifying => "verifying",
            Phase::Completed => "completed",
            Phase::VerificationFailed => "verification_failed",
            Phase::Failed => "failed",
        }
    }

    /// `completed` and `failed` end a work unit
    #[inline]
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Phase::Completed | Phase::Failed)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = UnknownPhase;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPhase(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown phase: {0}")]
pub struct UnknownPhase(pub String);

/// The fields a store compares before accepting a work-unit write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardedFields {
    pub phase: Phase,
    pub locked: bool,
    pub awaiting_human: bool,
}

impl fmt::Display for GuardedFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "phase={} locked={} awaiting_human={}",
            self.phase, self.locked, self.awaiting_human
        )
    }
}

/// One manufacturing attempt advancing through phases
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub id: WorkUnitId,
    pub phase: Phase,
    pub locked: bool,
    pub awaiting_human: bool,
    pub pause_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub last_actor: Option<String>,
    /// `verification_failed -> building` edges taken so far
    pub repair_cycles: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkUnit {
    /// Create a fresh unit at `idea`
    #[must_use]
    pub fn new(id: WorkUnitId) -> Self {
        let now = Utc::now();
        Self {
            id,
            phase: Phase::Idea,
            locked: false,
            awaiting_human: false,
            pause_reason: None,
            failure_reason: None,
            last_actor: None,
            repair_cycles: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[inline]
    #[must_use]
    pub fn guarded(&self) -> GuardedFields {
        GuardedFields {
            phase: self.phase,
            locked: self.locked,
            awaiting_human: self.awaiting_human,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            work_unit: self.id.clone(),
            phase: self.phase,
            locked: self.locked,
            awaiting_human: self.awaiting_human,
            pause_reason: self.pause_reason.clone(),
            failure_reason: self.failure_reason.clone(),
            last_actor: self.last_actor.clone(),
            repair_cycles: self.repair_cycles,
        }
    }
}

/// Read-only view of a work unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub work_unit: WorkUnitId,
    pub phase: Phase,
    pub locked: bool,
    pub awaiting_human: bool,
    pub pause_reason: Option<String>,
    pub failure_reason: Option<String>,
    pub last_actor: Option<String>,
    pub repair_cycles: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_names_round_trip() {
        for phase in Phase::ALL {
            assert_eq!(phase.as_str().parse::<Phase>().unwrap(), phase);
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
        }
        assert!("shipping".parse::<Phase>().is_err());
    }

    #[test]
    fn new_unit_starts_idle_at_idea() {
        let unit = WorkUnit::new(WorkUnitId::new("wu-1"));
        assert_eq!(
            unit.guarded(),
            GuardedFields {
                phase: Phase::Idea,
                locked: false,
                awaiting_human: false
            }
        );
        assert!(unit.snapshot().pause_reason.is_none());
    }
}
