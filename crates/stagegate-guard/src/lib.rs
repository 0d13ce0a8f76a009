//! Stagegate Execution Guard
//!
//! Applies an approved list of side-effecting actions inside a declared
//! scope. The first out-of-scope action or failed effect halts the run;
//! nothing after it is attempted and nothing is retried.
//!
//! # Architecture
//!
//! ```text
//! ExecutionAction[] ──► ExecutionScope::authorize ──► ActionEffector::apply
//!                               │ violation                 │ error
//!                               └────────► halt ◄───────────┘
//!                                            │
//!                                       ExecutionLog (sealed, hashed)
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod action;
mod effector;
mod guard;
mod log;
mod scope;

pub use action::{ActionId, ActionKind, ExecutionAction, LineRange};
pub use effector::{splice_lines, ActionEffector, EffectError, FsWorkspace, MemoryWorkspace};
pub use guard::{ExecutionGuard, GuardError, GuardState};
pub use log::{ActionFailure, ActionResult, ActionStatus, ExecutionLog, FailureClass, RunStatus};
pub use scope::{normalize_target, ExecutionScope, ScopeViolation};
