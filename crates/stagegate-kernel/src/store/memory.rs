use super::{ArtifactStore, StoreError};
use crate::types::{GuardedFields, WorkUnit};
use parking_lot::RwLock;
use stagegate_artifact::{Artifact, ArtifactError, ArtifactId, ArtifactKind, Decision, WorkUnitId};
use std::collections::HashMap;

#[derive(Debug, Default)]
struct ArtifactTable {
    records: HashMap<ArtifactId, Artifact>,
    /// Creation order per (work unit, kind)
    history: HashMap<(WorkUnitId, ArtifactKind), Vec<ArtifactId>>,
}

/// Process-local store backed by `RwLock<HashMap>` registries
#[derive(Debug, Default)]
pub struct InMemoryStore {
    work_units: RwLock<HashMap<WorkUnitId, WorkUnit>>,
    artifacts: RwLock<ArtifactTable>,
}

impl InMemoryStore {
    /// Create new empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.read().records.len()
    }
}

#[async_trait::async_trait]
impl ArtifactStore for InMemoryStore {
    async fn get_work_unit(&self, id: &WorkUnitId) -> Result<WorkUnit, StoreError> {
        self.work_units
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::WorkUnitNotFound(id.clone()))
    }

    async fn insert_work_unit(&self, unit: WorkUnit) -> Result<(), StoreError> {
        let mut units = self.work_units.write();
        if units.contains_key(&unit.id) {
            return Err(StoreError::WorkUnitExists(unit.id));
        }
        units.insert(unit.id.clone(), unit);
        Ok(())
    }

    async fn put_work_unit(&self, unit: WorkUnit, expected: GuardedFields) -> Result<(), StoreError> {
        let mut units = self.work_units.write();
        let current = units
            .get_mut(&unit.id)
            .ok_or_else(|| StoreError::WorkUnitNotFound(unit.id.clone()))?;
        let found = current.guarded();
        if found != expected {
            return Err(StoreError::Conflict {
                id: unit.id,
                expected,
                found,
            });
        }
        *current = unit;
        Ok(())
    }

    async fn list_work_units(&self) -> Result<Vec<WorkUnit>, StoreError> {
        let mut units: Vec<_> = self.work_units.read().values().cloned().collect();
        units.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(units)
    }

    async fn insert_artifact(&self, artifact: Artifact) -> Result<(), StoreError> {
        let mut table = self.artifacts.write();
        let id = artifact.id();
        if table.records.contains_key(&id) {
            return Err(StoreError::ArtifactExists(id));
        }
        table
            .history
            .entry((artifact.work_unit_id().clone(), artifact.kind()))
            .or_default()
            .push(id);
        table.records.insert(id, artifact);
        Ok(())
    }

    async fn finalize_artifact(&self, id: ArtifactId, decision: Decision) -> Result<Artifact, StoreError> {
        let mut table = self.artifacts.write();
        let record = table.records.get_mut(&id).ok_or(StoreError::ArtifactNotFound(id))?;
        record.decide(decision).map_err(|e| match e {
            ArtifactError::Immutable { id, status } => StoreError::AlreadyFinal { id, status },
            other => StoreError::Backend(other.to_string()),
        })?;
        Ok(record.clone())
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Artifact, StoreError> {
        self.artifacts
            .read()
            .records
            .get(&id)
            .cloned()
            .ok_or(StoreError::ArtifactNotFound(id))
    }

    async fn get_latest_artifact(
        &self,
        work_unit: &WorkUnitId,
        kind: ArtifactKind,
    ) -> Result<Option<Artifact>, StoreError> {
        let table = self.artifacts.read();
        Ok(table
            .history
            .get(&(work_unit.clone(), kind))
            .and_then(|ids| ids.last())
            .and_then(|id| table.records.get(id))
            .cloned())
    }

    async fn list_artifacts(&self, work_unit: &WorkUnitId, kind: ArtifactKind) -> Result<Vec<Artifact>, StoreError> {
        let table = self.artifacts.read();
        Ok(table
            .history
            .get(&(work_unit.clone(), kind))
            .map(|ids| ids.iter().filter_map(|id| table.records.get(id).cloned()).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;
    use stagegate_artifact::content::BasePrompt;
    use stagegate_artifact::{ArtifactContent, ArtifactStatus, UpstreamHashes, DEFAULT_EXCLUDED_FIELDS};

    fn artifact(unit: &str, name: &str) -> Artifact {
        let content = ArtifactContent::BasePrompt(BasePrompt {
            product_name: name.into(),
            problem_statement: "p".into(),
            target_users: vec!["u".into()],
            core_features: vec!["f".into()],
        });
        Artifact::submit(
            WorkUnitId::new(unit),
            content,
            UpstreamHashes::new(),
            DEFAULT_EXCLUDED_FIELDS,
            "test",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn put_rejects_stale_expectation() {
        let store = InMemoryStore::new();
        let unit = WorkUnit::new(WorkUnitId::new("wu"));
        let stale = unit.guarded();
        store.insert_work_unit(unit.clone()).await.unwrap();

        let mut advanced = unit.clone();
        advanced.phase = Phase::BasePromptReady;
        store.put_work_unit(advanced, stale).await.unwrap();

        let mut racing = unit;
        racing.locked = true;
        let err = store.put_work_unit(racing, stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn insert_work_unit_twice_fails() {
        let store = InMemoryStore::new();
        let unit = WorkUnit::new(WorkUnitId::new("wu"));
        store.insert_work_unit(unit.clone()).await.unwrap();
        assert_eq!(
            store.insert_work_unit(unit).await,
            Err(StoreError::WorkUnitExists(WorkUnitId::new("wu")))
        );
    }

    #[tokio::test]
    async fn history_keeps_creation_order_and_latest() {
        let store = InMemoryStore::new();
        let first = artifact("wu", "one");
        let second = artifact("wu", "two");
        store.insert_artifact(first.clone()).await.unwrap();
        store.insert_artifact(second.clone()).await.unwrap();
        store.insert_artifact(artifact("other", "x")).await.unwrap();

        let unit = WorkUnitId::new("wu");
        let all = store.list_artifacts(&unit, ArtifactKind::BasePrompt).await.unwrap();
        assert_eq!(all.iter().map(Artifact::id).collect::<Vec<_>>(), vec![first.id(), second.id()]);
        let latest = store.get_latest_artifact(&unit, ArtifactKind::BasePrompt).await.unwrap();
        assert_eq!(latest.map(|a| a.id()), Some(second.id()));
        assert!(store
            .get_latest_artifact(&unit, ArtifactKind::MasterPlan)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn finalize_is_one_shot() {
        let store = InMemoryStore::new();
        let record = artifact("wu", "one");
        let id = record.id();
        store.insert_artifact(record).await.unwrap();

        let approved = store.finalize_artifact(id, Decision::approve("alice")).await.unwrap();
        assert_eq!(approved.status(), ArtifactStatus::Approved);

        let err = store.finalize_artifact(id, Decision::reject("late")).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::AlreadyFinal {
                id,
                status: ArtifactStatus::Approved
            }
        );
        assert_eq!(store.get_artifact(id).await.unwrap().approved_by(), Some("alice"));
    }
}
