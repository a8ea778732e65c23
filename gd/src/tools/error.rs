//! Tool error types

use std::path::PathBuf;
use thiserror::Error;

use crate::vcs::VcsError;

/// Errors that can occur during tool execution
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Path {path} escapes worktree {worktree}")]
    SandboxViolation { path: PathBuf, worktree: PathBuf },

    #[error("Path {0} is inside the git directory")]
    GitDirectory(PathBuf),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Staging failed: {0}")]
    Vcs(#[from] VcsError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sandbox_violation_message() {
        let err = ToolError::SandboxViolation {
            path: PathBuf::from("/etc/passwd"),
            worktree: PathBuf::from("/tmp/repo"),
        };

        let msg = err.to_string();
        assert!(msg.contains("/etc/passwd"));
        assert!(msg.contains("/tmp/repo"));
    }
}
