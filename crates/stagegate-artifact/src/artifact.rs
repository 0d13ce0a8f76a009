//! The artifact record and its one-shot approval rule
//!
//! An [`Artifact`] is created in [`ArtifactStatus::AwaitingApproval`] with
//! its content hash and upstream hashes frozen. It accepts exactly one
//! [`Decision`]; afterwards every field is read-only and further decisions
//! fail with [`ArtifactError::Immutable`]. A retry after rejection is a new
//! record, never a mutation of the old one.

use crate::canonical::canonical_hash;
use crate::chain::{HashChainError, UpstreamHashes};
use crate::content::{ArtifactContent, ContentError};
use crate::hash::{ContentHash, HashError};
use crate::kind::ArtifactKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a work unit (one manufacturing attempt)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkUnitId(String);

impl WorkUnitId {
    /// Wrap an externally supplied identifier
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Fresh random identifier
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkUnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkUnitId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Identifier of one artifact record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Approval status of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    AwaitingApproval,
    Approved,
    Rejected,
}

impl ArtifactStatus {
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ArtifactStatus::AwaitingApproval => "awaiting_approval",
            ArtifactStatus::Approved => "approved",
            ArtifactStatus::Rejected => "rejected",
        }
    }

    /// Whether a decision has already been recorded
    #[inline]
    #[must_use]
    pub const fn is_final(self) -> bool {
        !matches!(self, ArtifactStatus::AwaitingApproval)
    }
}

impl fmt::Display for ArtifactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A human decision on an awaiting artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum Decision {
    Approve { by: String, at: DateTime<Utc> },
    Reject { reason: String, at: DateTime<Utc> },
}

impl Decision {
    /// Approve now
    pub fn approve(by: impl Into<String>) -> Self {
        Decision::Approve {
            by: by.into(),
            at: Utc::now(),
        }
    }

    /// Reject now
    pub fn reject(reason: impl Into<String>) -> Self {
        Decision::Reject {
            reason: reason.into(),
            at: Utc::now(),
        }
    }

    #[inline]
    #[must_use]
    pub fn resulting_status(&self) -> ArtifactStatus {
        match self {
            Decision::Approve { .. } => ArtifactStatus::Approved,
            Decision::Reject { .. } => ArtifactStatus::Rejected,
        }
    }
}

/// Errors related to artifact records
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// A decision was attempted on a finalized artifact
    #[error("artifact {id} is {status} and can no longer change")]
    Immutable { id: ArtifactId, status: ArtifactStatus },

    /// Payload failed validation
    #[error("invalid content: {0}")]
    InvalidContent(#[from] ContentError),

    /// Hashing failed
    #[error("hash error: {0}")]
    Hash(#[from] HashError),
}

/// One produced, hashed, approvable content record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    id: ArtifactId,
    work_unit_id: WorkUnitId,
    kind: ArtifactKind,
    content: ArtifactContent,
    content_hash: ContentHash,
    upstream_hashes: UpstreamHashes,
    status: ArtifactStatus,
    produced_by: String,
    created_at: DateTime<Utc>,
    approved_by: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    rejection_reason: Option<String>,
    rejected_at: Option<DateTime<Utc>>,
}

impl Artifact {
    /// Create a new awaiting artifact, computing its content hash once
    ///
    /// # Errors
    /// Returns error if the content fails validation or cannot be hashed
    pub fn submit<S: AsRef<str>>(
        work_unit_id: WorkUnitId,
        content: ArtifactContent,
        upstream_hashes: UpstreamHashes,
        excluded_fields: &[S],
        produced_by: impl Into<String>,
    ) -> Result<Self, ArtifactError> {
        content.validate()?;
        let content_hash = canonical_hash(&content, excluded_fields)?;
        Ok(Self {
            id: ArtifactId::new(),
            work_unit_id,
            kind: content.kind(),
            content,
            content_hash,
            upstream_hashes,
            status: ArtifactStatus::AwaitingApproval,
            produced_by: produced_by.into(),
            created_at: Utc::now(),
            approved_by: None,
            approved_at: None,
            rejection_reason: None,
            rejected_at: None,
        })
    }

    /// Record a human decision
    ///
    /// # Errors
    /// Returns [`ArtifactError::Immutable`] unless the artifact is awaiting
    /// approval; the record is left untouched in that case
    pub fn decide(&mut self, decision: Decision) -> Result<(), ArtifactError> {
        if self.status.is_final() {
            return Err(ArtifactError::Immutable {
                id: self.id,
                status: self.status,
            });
        }
        self.status = decision.resulting_status();
        match decision {
            Decision::Approve { by, at } => {
                self.approved_by = Some(by);
                self.approved_at = Some(at);
            }
            Decision::Reject { reason, at } => {
                self.rejection_reason = Some(reason);
                self.rejected_at = Some(at);
            }
        }
        Ok(())
    }

    /// Recompute the content hash and compare with the recorded one
    ///
    /// # Errors
    /// Returns [`HashChainError::ContentTampered`] on mismatch
    pub fn verify_content<S: AsRef<str>>(&self, excluded_fields: &[S]) -> Result<(), HashChainError> {
        let computed = canonical_hash(&self.content, excluded_fields)
            .map_err(|e| HashChainError::Unhashable(e.to_string()))?;
        if computed != self.content_hash {
            return Err(HashChainError::ContentTampered {
                kind: self.kind,
                recorded: self.content_hash,
                computed,
            });
        }
        Ok(())
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn work_unit_id(&self) -> &WorkUnitId {
        &self.work_unit_id
    }

    #[inline]
    #[must_use]
    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    #[inline]
    #[must_use]
    pub fn content(&self) -> &ArtifactContent {
        &self.content
    }

    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> &ContentHash {
        &self.content_hash
    }

    #[inline]
    #[must_use]
    pub fn upstream_hashes(&self) -> &UpstreamHashes {
        &self.upstream_hashes
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> ArtifactStatus {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn is_approved(&self) -> bool {
        self.status == ArtifactStatus::Approved
    }

    #[inline]
    #[must_use]
    pub fn produced_by(&self) -> &str {
        &self.produced_by
    }

    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    #[inline]
    #[must_use]
    pub fn approved_by(&self) -> Option<&str> {
        self.approved_by.as_deref()
    }

    #[inline]
    #[must_use]
    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    #[inline]
    #[must_use]
    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }
}
