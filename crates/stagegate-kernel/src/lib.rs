//! Stagegate Governance Kernel
//!
//! Governs a human-gated, multi-stage pipeline: every stage produces one
//! artifact, a human approves or rejects it, and only approval advances the
//! work unit to the next phase.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                 ArtifactLifecycle                    │
//! │  produce_and_submit ── approve ── reject ── verify   │
//! └───────┬───────────────────────┬──────────────────────┘
//!         │                       │
//! ┌───────▼────────────┐  ┌───────▼──────────────┐
//! │ ContextIsolation   │  │ Conductor            │
//! │ Loader             │  │ phase/lock/pause CAS │
//! └───────┬────────────┘  └───────┬──────────────┘
//!         │                       │
//! ┌───────▼───────────────────────▼──────────────┐
//! │              ArtifactStore                   │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! [`ExecutionSupervisor`] runs an execution guard under the unit's lock
//! for build-style stages, and [`RecoverySweep`] releases locks left by an
//! interrupted critical section.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod audit;
pub mod conductor;
pub mod config;
pub mod error;
pub mod isolation;
pub mod kernel;
pub mod lifecycle;
pub mod recovery;
pub mod stage;
pub mod state_machine;
pub mod store;
pub mod supervisor;
pub mod telemetry;
pub mod types;

pub use audit::{AuditEvent, AuditLog, AuditSink, FanoutAuditSink, NullAuditSink, TracingAuditSink};
pub use conductor::Conductor;
pub use config::{GovernanceConfig, LogConfig};
pub use error::{GovernanceError, IsolationFailure};
pub use isolation::{ContextIsolationLoader, IsolatedContext};
pub use kernel::GovernanceKernel;
pub use lifecycle::{ArtifactLifecycle, GenerationDelegate, GenerationError};
pub use recovery::{RecoveryReport, RecoverySweep};
pub use stage::{StageContract, StageRegistry};
pub use state_machine::StateViolation;
pub use store::{ArtifactStore, InMemoryStore, StoreError};
pub use supervisor::ExecutionSupervisor;
pub use types::{Phase, StateSnapshot, WorkUnit};

/// Kernel version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
