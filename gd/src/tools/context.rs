//! ToolContext - execution context for tools

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use super::ToolError;
use crate::vcs::Vcs;

/// Execution context for tools - scoped to one action
///
/// All file operations are constrained to the repository working tree.
/// When a `Vcs` is attached, writes are staged as they happen so the prompt
/// commit can be built from the index.
#[derive(Clone)]
pub struct ToolContext {
    /// Working tree root
    pub worktree: PathBuf,

    vcs: Option<Arc<dyn Vcs>>,
}

impl ToolContext {
    /// Context without staging
    pub fn new(worktree: PathBuf) -> Self {
        debug!(?worktree, "ToolContext::new: called");
        Self { worktree, vcs: None }
    }

    /// Context that stages every write through `vcs`
    pub fn with_vcs(vcs: Arc<dyn Vcs>) -> Self {
        let worktree = vcs.repo_root().to_path_buf();
        debug!(?worktree, "ToolContext::with_vcs: called");
        Self { worktree, vcs: Some(vcs) }
    }

    pub fn vcs(&self) -> Option<&Arc<dyn Vcs>> {
        self.vcs.as_ref()
    }

    fn worktree_canonical(&self) -> PathBuf {
        self.worktree.canonicalize().unwrap_or_else(|_| self.worktree.clone())
    }

    /// Resolve `path` inside the worktree (sandbox enforcement)
    ///
    /// Existing prefixes are canonicalized so symlinks cannot lead outside.
    /// `..` components are refused outright.
    pub fn validate_path(&self, path: &Path) -> Result<PathBuf, ToolError> {
        debug!(?path, "ToolContext::validate_path: called");
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            debug!("ToolContext::validate_path: parent component in path");
            return Err(ToolError::SandboxViolation {
                path: path.to_path_buf(),
                worktree: self.worktree.clone(),
            });
        }

        let normalized = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.worktree.join(path)
        };

        let mut existing = normalized.as_path();
        let mut rest = Vec::new();
        while !existing.exists() {
            match (existing.parent(), existing.file_name()) {
                (Some(parent), Some(name)) => {
                    rest.push(name.to_os_string());
                    existing = parent;
                }
                _ => {
                    debug!("ToolContext::validate_path: no existing ancestor");
                    return Err(ToolError::InvalidArgument(format!("Unresolvable path: {}", path.display())));
                }
            }
        }

        let mut canonical = existing.canonicalize()?;
        for name in rest.iter().rev() {
            canonical.push(name);
        }

        let worktree = self.worktree_canonical();
        let relative = match canonical.strip_prefix(&worktree) {
            Ok(r) => r,
            Err(_) => {
                debug!("ToolContext::validate_path: sandbox violation detected");
                return Err(ToolError::SandboxViolation {
                    path: path.to_path_buf(),
                    worktree: self.worktree.clone(),
                });
            }
        };

        if relative.as_os_str().is_empty() || relative.starts_with(".git") {
            debug!("ToolContext::validate_path: worktree root or git directory");
            return Err(ToolError::GitDirectory(path.to_path_buf()));
        }

        Ok(canonical)
    }

    /// Repository-relative, `/`-separated form of a validated path
    pub fn relative_path(&self, full: &Path) -> String {
        let worktree = self.worktree_canonical();
        let relative = full.strip_prefix(&worktree).unwrap_or(full);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("worktree", &self.worktree)
            .field("staging", &self.vcs.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_validate_path_within_worktree() {
        let temp = tempdir().unwrap();
        fs::write(temp.path().join("test.txt"), "content").unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let full = ctx.validate_path(Path::new("test.txt")).unwrap();
        assert_eq!(ctx.relative_path(&full), "test.txt");
    }

    #[test]
    fn test_validate_path_outside_worktree() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ctx.validate_path(Path::new("/etc/passwd"));
        assert!(matches!(result, Err(ToolError::SandboxViolation { .. })));
    }

    #[test]
    fn test_validate_path_rejects_parent_escape() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ctx.validate_path(Path::new("missing/../../outside.txt"));
        assert!(matches!(result, Err(ToolError::SandboxViolation { .. })));
    }

    #[test]
    fn test_validate_path_rejects_git_dir() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join(".git")).unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let result = ctx.validate_path(Path::new(".git/config"));
        assert!(matches!(result, Err(ToolError::GitDirectory(_))));
    }

    #[test]
    fn test_validate_new_nested_path() {
        let temp = tempdir().unwrap();
        let ctx = ToolContext::new(temp.path().to_path_buf());

        let full = ctx.validate_path(Path::new("nested/dir/new_file.txt")).unwrap();
        assert_eq!(ctx.relative_path(&full), "nested/dir/new_file.txt");
    }
}
