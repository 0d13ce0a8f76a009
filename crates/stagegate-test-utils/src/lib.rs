//! Testing utilities for the Stagegate workspace
//!
//! Content fixtures, stub generation delegates and seeded kernels.

#![allow(missing_docs)]

use parking_lot::Mutex;
use stagegate_artifact::content::{
    BasePrompt, BuildPrompt, BuildPrompts, Designs, MasterPlan, PlanModule, ProjectRule, ProjectRules, RuleSeverity,
    Screen, ScreenDesign, ScreenInventory, UserFlow, UserFlows,
};
use stagegate_artifact::{Artifact, ArtifactContent, ArtifactId, ArtifactKind, Decision, WorkUnitId};
use stagegate_kernel::types::GuardedFields;
use stagegate_kernel::{
    ArtifactStore, AuditLog, GenerationDelegate, GenerationError, GovernanceConfig, GovernanceKernel, InMemoryStore,
    IsolatedContext, StoreError, WorkUnit,
};
use std::sync::Arc;
use tokio::sync::oneshot;

pub fn base_prompt(product: &str) -> ArtifactContent {
    ArtifactContent::BasePrompt(BasePrompt {
        product_name: product.to_string(),
        problem_statement: "Teams lose track of shared expenses".to_string(),
        target_users: vec!["flatmates".to_string()],
        core_features: vec!["split a bill".to_string()],
    })
}

/// Valid content for any stage
pub fn content_for(kind: ArtifactKind) -> ArtifactContent {
    match kind {
        ArtifactKind::BasePrompt => base_prompt("Tally"),
        ArtifactKind::MasterPlan => ArtifactContent::MasterPlan(MasterPlan {
            vision: "Settle shared costs in one tap".to_string(),
            modules: vec![PlanModule {
                name: "ledger".to_string(),
                purpose: "record expenses".to_string(),
            }],
            non_goals: Vec::new(),
        }),
        ArtifactKind::ScreenInventory => ArtifactContent::ScreenInventory(ScreenInventory {
            screens: vec![Screen {
                name: "home".to_string(),
                route: "/".to_string(),
                purpose: "balances".to_string(),
            }],
        }),
        ArtifactKind::UserFlows => ArtifactContent::UserFlows(UserFlows {
            flows: vec![UserFlow {
                name: "check balance".to_string(),
                steps: vec!["home".to_string()],
            }],
        }),
        ArtifactKind::Designs => ArtifactContent::Designs(Designs {
            screens: vec![ScreenDesign {
                screen: "home".to_string(),
                layout: "single column".to_string(),
                components: vec!["list".to_string()],
            }],
        }),
        ArtifactKind::ProjectRules => ArtifactContent::ProjectRules(ProjectRules {
            rules: vec![ProjectRule {
                name: "integers".to_string(),
                statement: "Money is stored in minor units".to_string(),
                severity: RuleSeverity::Must,
            }],
        }),
        ArtifactKind::BuildPrompts => ArtifactContent::BuildPrompts(BuildPrompts {
            prompts: vec![BuildPrompt {
                order: 1,
                title: "home".to_string(),
                prompt: "Implement the home screen".to_string(),
                targets: vec!["app/home.rs".to_string()],
            }],
        }),
    }
}

/// Returns the same content on every call and records what it was shown
pub struct StaticGenerator {
    content: ArtifactContent,
    seen: Mutex<Vec<Vec<ArtifactKind>>>,
}

impl StaticGenerator {
    pub fn new(content: ArtifactContent) -> Self {
        Self {
            content,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn for_stage(kind: ArtifactKind) -> Self {
        Self::new(content_for(kind))
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().len()
    }

    /// Dependency kinds visible in each call's context
    pub fn contexts_seen(&self) -> Vec<Vec<ArtifactKind>> {
        self.seen.lock().clone()
    }
}

#[async_trait::async_trait]
impl GenerationDelegate for StaticGenerator {
    async fn generate(&self, context: &IsolatedContext) -> Result<ArtifactContent, GenerationError> {
        self.seen.lock().push(context.kinds().collect());
        Ok(self.content.clone())
    }

    fn name(&self) -> &str {
        "static-generator"
    }
}

/// Always fails
pub struct FailingGenerator {
    message: String,
}

impl FailingGenerator {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl GenerationDelegate for FailingGenerator {
    async fn generate(&self, _context: &IsolatedContext) -> Result<ArtifactContent, GenerationError> {
        Err(GenerationError::new(self.message.clone()))
    }
}

/// Kernel over a fresh in-memory store, recording audit events
pub struct TestKernel {
    pub kernel: GovernanceKernel,
    pub store: Arc<InMemoryStore>,
    pub audit: Arc<AuditLog>,
}

pub fn setup_kernel() -> TestKernel {
    setup_kernel_with(GovernanceConfig::default())
}

pub fn setup_kernel_with(config: GovernanceConfig) -> TestKernel {
    let store = Arc::new(InMemoryStore::new());
    let audit = Arc::new(AuditLog::new());
    let kernel = GovernanceKernel::new(config, store.clone(), audit.clone());
    TestKernel { kernel, store, audit }
}

/// Kernel whose store can hold one work-unit read open
///
/// `store` is the backing in-memory store, `gate` the wrapper the kernel
/// actually talks to.
pub fn setup_gated_kernel() -> (TestKernel, Arc<GatedStore>) {
    let store = Arc::new(InMemoryStore::new());
    let gate = Arc::new(GatedStore::new(store.clone()));
    let audit = Arc::new(AuditLog::new());
    let kernel = GovernanceKernel::new(GovernanceConfig::default(), gate.clone(), audit.clone());
    (TestKernel { kernel, store, audit }, gate)
}

struct Gate {
    reached: oneshot::Sender<()>,
    release: oneshot::Receiver<()>,
}

/// Store wrapper that can park a caller right after it read a work unit
pub struct GatedStore {
    inner: Arc<InMemoryStore>,
    gate: Mutex<Option<Gate>>,
}

/// Controls an armed [`GatedStore`]
pub struct GateHandle {
    reached: oneshot::Receiver<()>,
    release: oneshot::Sender<()>,
}

impl GatedStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            gate: Mutex::new(None),
        }
    }

    /// Park the next `get_work_unit` caller after its read completes
    pub fn arm(&self) -> GateHandle {
        let (reached_tx, reached_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        *self.gate.lock() = Some(Gate {
            reached: reached_tx,
            release: release_rx,
        });
        GateHandle {
            reached: reached_rx,
            release: release_tx,
        }
    }
}

impl GateHandle {
    /// Wait until a caller is parked holding its (now stale) read
    pub async fn parked(&mut self) {
        (&mut self.reached).await.unwrap();
    }

    pub fn release(self) {
        let _ = self.release.send(());
    }
}

#[async_trait::async_trait]
impl ArtifactStore for GatedStore {
    async fn get_work_unit(&self, id: &WorkUnitId) -> Result<WorkUnit, StoreError> {
        let unit = self.inner.get_work_unit(id).await;
        let gate = self.gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.reached.send(());
            let _ = gate.release.await;
        }
        unit
    }

    async fn insert_work_unit(&self, unit: WorkUnit) -> Result<(), StoreError> {
        self.inner.insert_work_unit(unit).await
    }

    async fn put_work_unit(&self, unit: WorkUnit, expected: GuardedFields) -> Result<(), StoreError> {
        self.inner.put_work_unit(unit, expected).await
    }

    async fn list_work_units(&self) -> Result<Vec<WorkUnit>, StoreError> {
        self.inner.list_work_units().await
    }

    async fn insert_artifact(&self, artifact: Artifact) -> Result<(), StoreError> {
        self.inner.insert_artifact(artifact).await
    }

    async fn finalize_artifact(&self, id: ArtifactId, decision: Decision) -> Result<Artifact, StoreError> {
        self.inner.finalize_artifact(id, decision).await
    }

    async fn get_artifact(&self, id: ArtifactId) -> Result<Artifact, StoreError> {
        self.inner.get_artifact(id).await
    }

    async fn get_latest_artifact(
        &self,
        work_unit: &WorkUnitId,
        kind: ArtifactKind,
    ) -> Result<Option<Artifact>, StoreError> {
        self.inner.get_latest_artifact(work_unit, kind).await
    }

    async fn list_artifacts(&self, work_unit: &WorkUnitId, kind: ArtifactKind) -> Result<Vec<Artifact>, StoreError> {
        self.inner.list_artifacts(work_unit, kind).await
    }
}

impl TestKernel {
    /// Initialize `id` and approve every stage up to and including `last`
    pub async fn approved_through(&self, id: &str, last: ArtifactKind) -> WorkUnitId {
        let unit = WorkUnitId::new(id);
        self.kernel.conductor().initialize(&unit).await.unwrap();
        for kind in ArtifactKind::ALL.into_iter().filter(|k| *k <= last) {
            self.submit_and_approve(&unit, kind).await;
        }
        unit
    }

    pub async fn submit(&self, unit: &WorkUnitId, kind: ArtifactKind) -> Artifact {
        self.kernel
            .lifecycle()
            .produce_and_submit(unit, kind, &StaticGenerator::for_stage(kind))
            .await
            .unwrap()
    }

    pub async fn submit_and_approve(&self, unit: &WorkUnitId, kind: ArtifactKind) -> Artifact {
        let artifact = self.submit(unit, kind).await;
        self.kernel.lifecycle().approve(artifact.id(), "reviewer").await.unwrap()
    }
}
