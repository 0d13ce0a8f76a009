//! Declarative execution scope
//!
//! A scope is plain data: per-operation allow lists plus a forbidden list.
//! A single routine, [`ExecutionScope::authorize`], decides every action.
//! Patterns ending in `/` match everything beneath that directory; all
//! other patterns match exactly.
//!
//! Targets and patterns are compared in normal form: `.` and empty
//! segments are dropped. Absolute targets, empty targets and targets
//! containing `..` never reach the allow or forbid lists.

use crate::action::{ActionKind, ExecutionAction, LineRange};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Capability declaration for one execution run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionScope {
    #[serde(default)]
    allowed: BTreeMap<ActionKind, BTreeSet<String>>,
    #[serde(default)]
    forbidden: BTreeSet<String>,
}

impl ExecutionScope {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `kind` on targets matching `pattern`
    #[must_use]
    pub fn allow(mut self, kind: ActionKind, pattern: impl Into<String>) -> Self {
        self.allowed.entry(kind).or_default().insert(pattern.into());
        self
    }

    /// Forbid every operation on targets matching `pattern`
    #[must_use]
    pub fn forbid(mut self, pattern: impl Into<String>) -> Self {
        self.forbidden.insert(pattern.into());
        self
    }

    /// Check the target/operation part of an action
    ///
    /// Forbidden patterns are checked first and win even when the target is
    /// also allow-listed. On success the action is returned with its target
    /// in normal form; that is the action effectors must apply.
    ///
    /// # Errors
    /// Returns the violated rule
    pub fn authorize(&self, action: &ExecutionAction) -> Result<ExecutionAction, ScopeViolation> {
        let target = normalize_target(&action.target)?;
        if let Some(pattern) = self.forbidden.iter().find(|p| pattern_matches(p, &target)) {
            return Err(ScopeViolation::Forbidden {
                target: action.target.clone(),
                pattern: pattern.clone(),
            });
        }
        let allowed = self
            .allowed
            .get(&action.kind)
            .is_some_and(|patterns| patterns.iter().any(|p| pattern_matches(p, &target)));
        if !allowed {
            return Err(ScopeViolation::NotAllowed {
                kind: action.kind,
                target: action.target.clone(),
            });
        }
        Ok(ExecutionAction {
            target,
            ..action.clone()
        })
    }

    /// Check a sub-range constraint against the target's current size
    ///
    /// `line_count` is `None` when the target does not exist.
    ///
    /// # Errors
    /// Returns [`ScopeViolation::RangeOutOfBounds`] or
    /// [`ScopeViolation::RangeOnMissingTarget`]
    pub fn check_range(
        target: &str,
        range: LineRange,
        line_count: Option<usize>,
    ) -> Result<(), ScopeViolation> {
        match line_count {
            None => Err(ScopeViolation::RangeOnMissingTarget {
                target: target.to_string(),
                range,
            }),
            Some(lines) if !range.fits(lines) => Err(ScopeViolation::RangeOutOfBounds {
                target: target.to_string(),
                range,
                lines,
            }),
            Some(_) => Ok(()),
        }
    }
}

/// Normal form of a relative target
///
/// # Errors
/// Returns [`ScopeViolation::InvalidTarget`] for empty, absolute or
/// parent-escaping targets
pub fn normalize_target(target: &str) -> Result<String, ScopeViolation> {
    let invalid = |reason: &'static str| ScopeViolation::InvalidTarget {
        target: target.to_string(),
        reason,
    };
    if target.starts_with('/') || Path::new(target).is_absolute() {
        return Err(invalid("absolute path"));
    }
    let mut segments = Vec::new();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(invalid("parent directory component")),
            other => segments.push(other),
        }
    }
    if segments.is_empty() {
        return Err(invalid("empty path"));
    }
    Ok(segments.join("/"))
}

/// `target` must already be in normal form
fn pattern_matches(pattern: &str, target: &str) -> bool {
    let Ok(normal) = normalize_target(pattern) else {
        return false;
    };
    if pattern.ends_with('/') {
        target
            .strip_prefix(normal.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    } else {
        normal == target
    }
}

/// An action outside its declared bounds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScopeViolation {
    #[error("target {target} is forbidden by pattern {pattern}")]
    Forbidden { target: String, pattern: String },

    #[error("{kind} is not allowed on {target}")]
    NotAllowed { kind: ActionKind, target: String },

    #[error("range {range} exceeds {target} which has {lines} lines")]
    RangeOutOfBounds {
        target: String,
        range: LineRange,
        lines: usize,
    },

    #[error("range {range} declared on missing target {target}")]
    RangeOnMissingTarget { target: String, range: LineRange },

    #[error("target {target:?} is not a plain relative path: {reason}")]
    InvalidTarget { target: String, reason: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> ExecutionScope {
        ExecutionScope::new()
            .allow(ActionKind::Create, "src/")
            .allow(ActionKind::Modify, "src/main.rs")
            .allow(ActionKind::Modify, ".env")
            .forbid(".env")
    }

    #[test]
    fn allowed_directory_pattern_matches_children() {
        let action = ExecutionAction::create("a1", "src/lib.rs", "");
        assert!(scope().authorize(&action).is_ok());
    }

    #[test]
    fn allow_list_is_per_operation() {
        let action = ExecutionAction::modify("a2", "src/lib.rs", "");
        assert_eq!(
            scope().authorize(&action),
            Err(ScopeViolation::NotAllowed {
                kind: ActionKind::Modify,
                target: "src/lib.rs".into()
            })
        );
    }

    #[test]
    fn forbidden_wins_over_allowed() {
        let action = ExecutionAction::modify("a3", ".env", "SECRET=1");
        assert!(matches!(
            scope().authorize(&action),
            Err(ScopeViolation::Forbidden { .. })
        ));
    }

    #[test]
    fn exact_pattern_does_not_match_prefix() {
        let action = ExecutionAction::modify("a4", "src/main.rs.bak", "");
        assert!(scope().authorize(&action).is_err());
    }

    #[test]
    fn dot_and_empty_segments_cannot_dodge_forbidden() {
        for target in ["./.env", ".//.env", "src/../.env"] {
            let action = ExecutionAction::modify("a5", target, "SECRET=1");
            assert!(scope().authorize(&action).is_err(), "{target}");
        }
    }

    #[test]
    fn authorized_action_carries_normal_target() {
        let action = ExecutionAction::create("a6", "src/./nested//lib.rs", "");
        let authorized = scope().authorize(&action).unwrap();
        assert_eq!(authorized.target, "src/nested/lib.rs");
        assert_eq!(authorized.id, action.id);
    }

    #[test]
    fn normalize_rejects_escapes_and_empty() {
        assert_eq!(normalize_target("a//b/./c").unwrap(), "a/b/c");
        for bad in ["", ".", "//", "/etc/passwd", "../x", "a/../../x"] {
            assert!(
                matches!(normalize_target(bad), Err(ScopeViolation::InvalidTarget { .. })),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn directory_pattern_needs_a_segment_boundary() {
        let scope = ExecutionScope::new().allow(ActionKind::Create, "./src//");
        assert!(scope.authorize(&ExecutionAction::create("a7", "src/x.rs", "")).is_ok());
        assert!(scope.authorize(&ExecutionAction::create("a8", "srcx/x.rs", "")).is_err());
    }

    #[test]
    fn range_checks() {
        let range = LineRange::new(2, 4).unwrap();
        assert!(ExecutionScope::check_range("f", range, Some(4)).is_ok());
        assert!(matches!(
            ExecutionScope::check_range("f", range, Some(3)),
            Err(ScopeViolation::RangeOutOfBounds { lines: 3, .. })
        ));
        assert!(matches!(
            ExecutionScope::check_range("f", range, None),
            Err(ScopeViolation::RangeOnMissingTarget { .. })
        ));
    }
}
