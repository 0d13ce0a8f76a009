//! Context isolation
//!
//! A stage sees only the approved content of the dependencies it declared.
//! [`IsolatedContext`] has no path back to the store, so drafts, rejected
//! records and undeclared kinds are unreachable from generation code.

use crate::error::{GovernanceError, IsolationFailure};
use crate::store::ArtifactStore;
use stagegate_artifact::{ArtifactContent, ArtifactId, ArtifactKind, ArtifactStatus, ContentHash, UpstreamHashes, WorkUnitId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One approved upstream input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedInput {
    pub artifact: ArtifactId,
    pub content: ArtifactContent,
    pub content_hash: ContentHash,
}

/// Immutable, verified inputs for one stage run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolatedContext {
    work_unit: WorkUnitId,
    inputs: BTreeMap<ArtifactKind, ApprovedInput>,
}

impl IsolatedContext {
    #[inline]
    #[must_use]
    pub fn work_unit(&self) -> &WorkUnitId {
        &self.work_unit
    }

    /// Approved content of a declared dependency
    #[must_use]
    pub fn get(&self, kind: ArtifactKind) -> Option<&ArtifactContent> {
        self.inputs.get(&kind).map(|i| &i.content)
    }

    #[must_use]
    pub fn input(&self, kind: ArtifactKind) -> Option<&ApprovedInput> {
        self.inputs.get(&kind)
    }

    /// Declared dependency kinds, in pipeline order
    pub fn kinds(&self) -> impl Iterator<Item = ArtifactKind> + '_ {
        self.inputs.keys().copied()
    }

    /// Hashes observed at load time, frozen into the new artifact
    #[must_use]
    pub fn upstream_hashes(&self) -> UpstreamHashes {
        self.inputs.iter().map(|(k, i)| (*k, i.content_hash)).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

/// Loads and verifies declared dependencies
#[derive(Clone)]
pub struct ContextIsolationLoader {
    store: Arc<dyn ArtifactStore>,
}

impl std::fmt::Debug for ContextIsolationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextIsolationLoader").finish_non_exhaustive()
    }
}

impl ContextIsolationLoader {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }

    /// Load the latest artifact of every declared kind
    ///
    /// Each must be approved and carry a content hash.
    ///
    /// # Errors
    /// Returns [`GovernanceError::ContextIsolationViolation`] naming the
    /// first dependency (in pipeline order) that fails
    pub async fn load_isolated_context(
        &self,
        work_unit: &WorkUnitId,
        dependencies: &[ArtifactKind],
    ) -> Result<IsolatedContext, GovernanceError> {
        let mut declared: Vec<ArtifactKind> = dependencies.to_vec();
        declared.sort_unstable();
        declared.dedup();

        let mut inputs = BTreeMap::new();
        for kind in declared {
            let violation = |failure: IsolationFailure| {
                tracing::warn!(work_unit = %work_unit, dependency = %kind, %failure, "Context isolation violation");
                GovernanceError::ContextIsolationViolation {
                    work_unit: work_unit.clone(),
                    dependency: kind,
                    failure,
                }
            };

            let artifact = self
                .store
                .get_latest_artifact(work_unit, kind)
                .await?
                .ok_or_else(|| violation(IsolationFailure::Missing))?;
            if artifact.status() != ArtifactStatus::Approved {
                return Err(violation(IsolationFailure::NotApproved(artifact.status())));
            }
            if artifact.content_hash().is_zero() {
                return Err(violation(IsolationFailure::Unhashed));
            }
            inputs.insert(
                kind,
                ApprovedInput {
                    artifact: artifact.id(),
                    content: artifact.content().clone(),
                    content_hash: *artifact.content_hash(),
                },
            );
        }

        tracing::debug!(work_unit = %work_unit, inputs = inputs.len(), "Isolated context loaded");
        Ok(IsolatedContext {
            work_unit: work_unit.clone(),
            inputs,
        })
    }

    /// Current hash of the latest approved artifact of each kind
    ///
    /// Kinds without an approved record are absent from the result, which
    /// [`stagegate_artifact::verify_chain`] reports as a missing upstream.
    ///
    /// # Errors
    /// Returns store errors only
    pub async fn current_hashes(
        &self,
        work_unit: &WorkUnitId,
        kinds: &[ArtifactKind],
    ) -> Result<UpstreamHashes, GovernanceError> {
        let mut actual = UpstreamHashes::new();
        for &kind in kinds {
            let approved = self
                .store
                .list_artifacts(work_unit, kind)
                .await?
                .into_iter()
                .rev()
                .find(stagegate_artifact::Artifact::is_approved);
            if let Some(artifact) = approved {
                actual.insert(kind, *artifact.content_hash());
            }
        }
        Ok(actual)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use stagegate_artifact::content::BasePrompt;
    use stagegate_artifact::{Artifact, Decision, DEFAULT_EXCLUDED_FIELDS};

    fn base_prompt(unit: &WorkUnitId) -> Artifact {
        Artifact::submit(
            unit.clone(),
            ArtifactContent::BasePrompt(BasePrompt {
                product_name: "Ledger".into(),
                problem_statement: "track spend".into(),
                target_users: vec!["freelancers".into()],
                core_features: vec!["import".into()],
            }),
            UpstreamHashes::new(),
            DEFAULT_EXCLUDED_FIELDS,
            "test",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn empty_declaration_yields_empty_context() {
        let loader = ContextIsolationLoader::new(Arc::new(InMemoryStore::new()));
        let ctx = loader.load_isolated_context(&WorkUnitId::new("wu"), &[]).await.unwrap();
        assert!(ctx.is_empty());
        assert!(ctx.upstream_hashes().is_empty());
    }

    #[tokio::test]
    async fn latest_record_decides_even_if_older_was_approved() {
        let store = Arc::new(InMemoryStore::new());
        let unit = WorkUnitId::new("wu");
        let first = base_prompt(&unit);
        let first_id = first.id();
        store.insert_artifact(first).await.unwrap();
        store.finalize_artifact(first_id, Decision::approve("a")).await.unwrap();
        store.insert_artifact(base_prompt(&unit)).await.unwrap();

        let loader = ContextIsolationLoader::new(store);
        let err = loader
            .load_isolated_context(&unit, &[ArtifactKind::BasePrompt])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GovernanceError::ContextIsolationViolation {
                failure: IsolationFailure::NotApproved(ArtifactStatus::AwaitingApproval),
                ..
            }
        ));

        let hashes = loader.current_hashes(&unit, &[ArtifactKind::BasePrompt]).await.unwrap();
        assert_eq!(hashes.len(), 1);
    }
}
