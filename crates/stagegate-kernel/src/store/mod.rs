//! Artifact store
//!
//! The store is the single source of truth for work units and artifacts.
//! The kernel never caches either across calls.
//!
//! Write rules:
//! - work units are inserted once and then only replaced through
//!   [`ArtifactStore::put_work_unit`], which compares `phase`, `locked` and
//!   `awaiting_human` with the caller's expectation before writing
//! - artifacts are insert-only; [`ArtifactStore::finalize_artifact`] is the
//!   single permitted update and only applies to an awaiting record

mod memory;

pub use memory::InMemoryStore;

use crate::types::{GuardedFields, WorkUnit};
use stagegate_artifact::{Artifact, ArtifactId, ArtifactKind, ArtifactStatus, Decision, WorkUnitId};

/// Errors reported by a store
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("work unit {0} already exists")]
    WorkUnitExists(WorkUnitId),

    #[error("work unit {0} not found")]
    WorkUnitNotFound(WorkUnitId),

    #[error("artifact {0} not found")]
    ArtifactNotFound(ArtifactId),

    #[error("artifact {0} already stored")]
    ArtifactExists(ArtifactId),

    /// Compare-and-swap lost
    #[error("work unit {id} changed concurrently: expected {expected}, found {found}")]
    Conflict {
        id: WorkUnitId,
        expected: GuardedFields,
        found: GuardedFields,
    },

    #[error("artifact {id} is already {status}")]
    AlreadyFinal { id: ArtifactId, status: ArtifactStatus },

    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable keyed storage for work units and artifacts
#[async_trait::async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn get_work_unit(&self, id: &WorkUnitId) -> Result<WorkUnit, StoreError>;

    /// Insert a new unit; fails if the id is taken
    async fn insert_work_unit(&self, unit: WorkUnit) -> Result<(), StoreError>;

    /// Replace a unit if its guarded fields still equal `expected`
    async fn put_work_unit(&self, unit: WorkUnit, expected: GuardedFields) -> Result<(), StoreError>;

    async fn list_work_units(&self) -> Result<Vec<WorkUnit>, StoreError>;

    /// Insert a new artifact record
    async fn insert_artifact(&self, artifact: Artifact) -> Result<(), StoreError>;

    /// Apply the one-shot decision to an awaiting artifact
    async fn finalize_artifact(&self, id: ArtifactId, decision: Decision) -> Result<Artifact, StoreError>;

    async fn get_artifact(&self, id: ArtifactId) -> Result<Artifact, StoreError>;

    /// Most recently created artifact of `kind`, whatever its status
    async fn get_latest_artifact(
        &self,
        work_unit: &WorkUnitId,
        kind: ArtifactKind,
    ) -> Result<Option<Artifact>, StoreError>;

    /// Every artifact of `kind` in creation order
    async fn list_artifacts(&self, work_unit: &WorkUnitId, kind: ArtifactKind) -> Result<Vec<Artifact>, StoreError>;
}
