//! Stagegate Artifact System
//!
//! Content-hashed, approvable artifacts and the hash chain that links them.
//!
//! # Core Concepts
//!
//! - [`ContentHash`]: 32-byte SHA-256 digest
//! - [`canonical_hash`]: deterministic hash over sorted-key JSON with
//!   volatile fields stripped
//! - [`verify_chain`]: compares an artifact's declared upstream hashes with
//!   the hashes actually stored
//! - [`Artifact`]: one record, approvable or rejectable exactly once
//! - [`ArtifactContent`]: typed payload, one variant per [`ArtifactKind`]
//!
//! # Example
//!
//! ```rust,ignore
//! use stagegate_artifact::{canonical_hash, DEFAULT_EXCLUDED_FIELDS};
//!
//! let a = serde_json::json!({"title": "Plan", "id": "1"});
//! let b = serde_json::json!({"id": "2", "title": "Plan"});
//! assert_eq!(
//!     canonical_hash(&a, DEFAULT_EXCLUDED_FIELDS)?,
//!     canonical_hash(&b, DEFAULT_EXCLUDED_FIELDS)?,
//! );
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod artifact;
mod canonical;
mod chain;
pub mod content;
mod hash;
mod kind;

pub use artifact::{Artifact, ArtifactError, ArtifactId, ArtifactStatus, Decision, WorkUnitId};
pub use canonical::{canonical_hash, strip_fields, to_canonical_json, DEFAULT_EXCLUDED_FIELDS};
pub use chain::{verify_chain, HashChainError, UpstreamHashes};
pub use content::{ArtifactContent, ContentError};
pub use hash::{ContentHash, HashError};
pub use kind::{ArtifactKind, UnknownKind};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
