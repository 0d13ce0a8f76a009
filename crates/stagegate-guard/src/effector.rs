//! Effectors perform the side effects of authorized actions
//!
//! [`MemoryWorkspace`] keeps files in a map and is what tests and the demo
//! use. [`FsWorkspace`] writes beneath a root directory and refuses any
//! target that would escape it.

use crate::action::{ActionKind, ExecutionAction, LineRange};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// Performs the effect of one action
#[async_trait::async_trait]
pub trait ActionEffector: Send + Sync {
    /// Current line count of `target`, `None` if it does not exist
    async fn line_count(&self, target: &str) -> Result<Option<usize>, EffectError>;

    /// Apply an already-authorized action
    async fn apply(&self, action: &ExecutionAction) -> Result<(), EffectError>;
}

/// Failure while applying an effect
#[derive(Debug, thiserror::Error)]
pub enum EffectError {
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("{0} does not exist")]
    NotFound(String),

    #[error("{0} escapes the workspace root")]
    OutsideRoot(String),

    #[error("{kind} action on {target} carries no content")]
    MissingContent { kind: ActionKind, target: String },

    #[error("io error on {target}: {source}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Replace lines `range` (1-based, inclusive) of `original` with `replacement`
#[must_use]
pub fn splice_lines(original: &str, range: LineRange, replacement: &str) -> String {
    let lines: Vec<&str> = original.lines().collect();
    let head = &lines[..(range.start() - 1).min(lines.len())];
    let tail = &lines[range.end().min(lines.len())..];
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    out.extend_from_slice(head);
    out.extend(replacement.lines());
    out.extend_from_slice(tail);
    let mut joined = out.join("\n");
    if original.ends_with('\n') {
        joined.push('\n');
    }
    joined
}

fn required_content(action: &ExecutionAction) -> Result<&str, EffectError> {
    action
        .content
        .as_deref()
        .ok_or_else(|| EffectError::MissingContent {
            kind: action.kind,
            target: action.target.clone(),
        })
}

/// In-memory file map
#[derive(Debug, Default)]
pub struct MemoryWorkspace {
    files: Mutex<BTreeMap<String, String>>,
}

impl MemoryWorkspace {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.lock().insert(path.into(), content.into());
        self
    }

    #[must_use]
    pub fn read(&self, path: &str) -> Option<String> {
        self.files.lock().get(path).cloned()
    }

    #[must_use]
    pub fn exists(&self, path: &str) -> bool {
        self.files.lock().contains_key(path)
    }

    /// Snapshot of every file
    #[must_use]
    pub fn files(&self) -> BTreeMap<String, String> {
        self.files.lock().clone()
    }
}

#[async_trait::async_trait]
impl ActionEffector for MemoryWorkspace {
    async fn line_count(&self, target: &str) -> Result<Option<usize>, EffectError> {
        Ok(self.files.lock().get(target).map(|c| c.lines().count()))
    }

    async fn apply(&self, action: &ExecutionAction) -> Result<(), EffectError> {
        let mut files = self.files.lock();
        let target = action.target.clone();
        match action.kind {
            ActionKind::Create => {
                if files.contains_key(&target) {
                    return Err(EffectError::AlreadyExists(target));
                }
                let content = required_content(action)?.to_string();
                files.insert(target, content);
            }
            ActionKind::Modify => {
                let replacement = required_content(action)?;
                let current = files
                    .get_mut(&target)
                    .ok_or_else(|| EffectError::NotFound(target.clone()))?;
                *current = match action.range {
                    Some(range) => splice_lines(current, range, replacement),
                    None => replacement.to_string(),
                };
            }
            ActionKind::Delete => {
                files.remove(&target).ok_or(EffectError::NotFound(target))?;
            }
        }
        Ok(())
    }
}

/// Files beneath a root directory
#[derive(Debug, Clone)]
pub struct FsWorkspace {
    root: PathBuf,
}

impl FsWorkspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `target` under the root; only plain relative components are accepted
    fn resolve(&self, target: &str) -> Result<PathBuf, EffectError> {
        let relative = Path::new(target);
        let clean = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !clean || target.is_empty() {
            return Err(EffectError::OutsideRoot(target.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

fn io_err(target: &str) -> impl FnOnce(std::io::Error) -> EffectError + '_ {
    move |source| EffectError::Io {
        target: target.to_string(),
        source,
    }
}

#[async_trait::async_trait]
impl ActionEffector for FsWorkspace {
    async fn line_count(&self, target: &str) -> Result<Option<usize>, EffectError> {
        let path = self.resolve(target)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content.lines().count())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_err(target)(e)),
        }
    }

    async fn apply(&self, action: &ExecutionAction) -> Result<(), EffectError> {
        let target = action.target.as_str();
        let path = self.resolve(target)?;
        match action.kind {
            ActionKind::Create => {
                let content = required_content(action)?;
                if let Some(parent) = path.parent() {
                    tokio::fs::create_dir_all(parent).await.map_err(io_err(target))?;
                }
                let mut file = tokio::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(&path)
                    .await
                    .map_err(|e| match e.kind() {
                        std::io::ErrorKind::AlreadyExists => EffectError::AlreadyExists(target.to_string()),
                        _ => io_err(target)(e),
                    })?;
                file.write_all(content.as_bytes()).await.map_err(io_err(target))?;
                file.flush().await.map_err(io_err(target))?;
            }
            ActionKind::Modify => {
                if !tokio::fs::try_exists(&path).await.map_err(io_err(target))? {
                    return Err(EffectError::NotFound(target.to_string()));
                }
                let replacement = required_content(action)?;
                let updated = match action.range {
                    Some(range) => {
                        let current = tokio::fs::read_to_string(&path).await.map_err(io_err(target))?;
                        splice_lines(&current, range, replacement)
                    }
                    None => replacement.to_string(),
                };
                tokio::fs::write(&path, updated).await.map_err(io_err(target))?;
            }
            ActionKind::Delete => match tokio::fs::remove_file(&path).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    return Err(EffectError::NotFound(target.to_string()));
                }
                Err(e) => return Err(io_err(target)(e)),
            },
        }
        Ok(())
    }
}
