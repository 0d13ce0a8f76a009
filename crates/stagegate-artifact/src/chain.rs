//! Hash-chain verification
//!
//! An artifact freezes the hashes of the upstream artifacts it was built
//! from. Verification compares those declared hashes with the hashes the
//! upstream records actually carry now. Any difference means either the
//! upstream was tampered with or the declaration is stale.

use crate::hash::ContentHash;
use crate::kind::ArtifactKind;
use std::collections::BTreeMap;

/// Dependency kind -> content hash, ordered upstream-first
pub type UpstreamHashes = BTreeMap<ArtifactKind, ContentHash>;

/// Verify declared upstream hashes against the stored ones
///
/// `actual` holds the current `content_hash` of each upstream record that
/// could be found. Extra entries in `actual` are ignored.
///
/// # Errors
/// Returns the first dependency (in pipeline order) that is missing or
/// whose hash differs
pub fn verify_chain(declared: &UpstreamHashes, actual: &UpstreamHashes) -> Result<(), HashChainError> {
    for (kind, declared_hash) in declared {
        match actual.get(kind) {
            None => return Err(HashChainError::MissingUpstream { kind: *kind }),
            Some(actual_hash) if actual_hash != declared_hash => {
                return Err(HashChainError::Mismatch {
                    kind: *kind,
                    declared: *declared_hash,
                    actual: *actual_hash,
                });
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Hash-chain verification failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashChainError {
    /// Declared hash differs from the stored upstream hash
    #[error("upstream {kind} hash mismatch: declared {declared}, stored {actual}")]
    Mismatch {
        kind: ArtifactKind,
        declared: ContentHash,
        actual: ContentHash,
    },

    /// Declared upstream no longer resolves to a stored record
    #[error("upstream {kind} referenced by hash chain is not stored")]
    MissingUpstream { kind: ArtifactKind },

    /// Stored content no longer hashes to the recorded content hash
    #[error("content of {kind} artifact no longer matches its hash: recorded {recorded}, computed {computed}")]
    ContentTampered {
        kind: ArtifactKind,
        recorded: ContentHash,
        computed: ContentHash,
    },

    /// Stored content could not be re-serialized for hashing
    #[error("stored content cannot be hashed: {0}")]
    Unhashable(String),
}
