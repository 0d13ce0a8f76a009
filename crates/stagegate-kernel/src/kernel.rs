//! Kernel handle wiring the governance components around one store

use crate::audit::AuditSink;
use crate::conductor::Conductor;
use crate::config::GovernanceConfig;
use crate::lifecycle::ArtifactLifecycle;
use crate::recovery::RecoverySweep;
use crate::stage::StageRegistry;
use crate::store::ArtifactStore;
use crate::supervisor::ExecutionSupervisor;
use stagegate_guard::ActionEffector;
use std::sync::Arc;

/// Shared entry point for stages and the approval surface
#[derive(Debug, Clone)]
pub struct GovernanceKernel {
    config: GovernanceConfig,
    conductor: Conductor,
    lifecycle: ArtifactLifecycle,
}

impl GovernanceKernel {
    /// Create a kernel with the standard stage registry
    pub fn new(config: GovernanceConfig, store: Arc<dyn ArtifactStore>, audit: Arc<dyn AuditSink>) -> Self {
        let registry = StageRegistry::standard().with_excluded_fields(&config.excluded_fields);
        Self::with_registry(config, store, audit, registry)
    }

    pub fn with_registry(
        config: GovernanceConfig,
        store: Arc<dyn ArtifactStore>,
        audit: Arc<dyn AuditSink>,
        registry: StageRegistry,
    ) -> Self {
        let conductor = Conductor::new(store, audit, config.max_repair_cycles);
        let lifecycle = ArtifactLifecycle::new(conductor.clone(), registry);
        Self {
            config,
            conductor,
            lifecycle,
        }
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &GovernanceConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn conductor(&self) -> &Conductor {
        &self.conductor
    }

    #[inline]
    #[must_use]
    pub fn lifecycle(&self) -> &ArtifactLifecycle {
        &self.lifecycle
    }

    /// Supervisor applying actions through `effector`
    #[must_use]
    pub fn supervisor(&self, effector: Arc<dyn ActionEffector>) -> ExecutionSupervisor {
        ExecutionSupervisor::new(self.conductor.clone(), effector, self.config.excluded_fields.clone())
    }

    #[must_use]
    pub fn recovery(&self) -> RecoverySweep {
        RecoverySweep::new(self.conductor.clone(), self.config.recovery_reason.clone())
    }
}
