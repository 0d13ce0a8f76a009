//! Declared side-effecting actions

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an action within one plan
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(String);

impl ActionId {
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Operation an action performs on its target
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Create,
    Modify,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ActionKind::Create => "create",
            ActionKind::Modify => "modify",
            ActionKind::Delete => "delete",
        })
    }
}

/// 1-based inclusive line range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    start: usize,
    end: usize,
}

impl LineRange {
    /// Create a range; `None` if `start` is zero or after `end`
    #[inline]
    #[must_use]
    pub fn new(start: usize, end: usize) -> Option<Self> {
        (start >= 1 && start <= end).then_some(Self { start, end })
    }

    #[inline]
    #[must_use]
    pub const fn start(&self) -> usize {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> usize {
        self.end
    }

    /// Whether the range lies inside a target of `line_count` lines
    #[inline]
    #[must_use]
    pub const fn fits(&self, line_count: usize) -> bool {
        self.end <= line_count
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// One bounded, auditable step of an approved plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionAction {
    pub id: ActionId,
    pub target: String,
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<LineRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ExecutionAction {
    /// Create `target` with `content`
    pub fn create(id: impl Into<String>, target: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(id),
            target: target.into(),
            kind: ActionKind::Create,
            range: None,
            content: Some(content.into()),
        }
    }

    /// Replace the content of `target` (whole file unless a range is set)
    pub fn modify(id: impl Into<String>, target: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(id),
            target: target.into(),
            kind: ActionKind::Modify,
            range: None,
            content: Some(content.into()),
        }
    }

    /// Remove `target`
    pub fn delete(id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: ActionId::new(id),
            target: target.into(),
            kind: ActionKind::Delete,
            range: None,
            content: None,
        }
    }

    /// Restrict the action to a line range of the target
    #[must_use]
    pub fn with_range(mut self, range: LineRange) -> Self {
        self.range = Some(range);
        self
    }
}
