//! Version-control error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by version-control primitives
#[derive(Debug, Error)]
pub enum VcsError {
    #[error("Not a git repository: {0}")]
    NotARepository(PathBuf),

    #[error("git {args} failed ({code:?}): {stderr}")]
    CommandFailed {
        args: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Unexpected git output: {0}")]
    InvalidOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VcsError {
    /// stderr of a failed git invocation, if any
    pub fn stderr(&self) -> Option<&str> {
        match self {
            VcsError::CommandFailed { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

/// Result alias for version-control operations
pub type VcsResult<T> = Result<T, VcsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_failed_message() {
        let err = VcsError::CommandFailed {
            args: "checkout main".to_string(),
            code: Some(1),
            stderr: "pathspec 'main' did not match".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("checkout main"));
        assert!(msg.contains("did not match"));
        assert_eq!(err.stderr(), Some("pathspec 'main' did not match"));
    }

    #[test]
    fn test_stderr_absent_for_other_variants() {
        let err = VcsError::InvalidOutput("garbage".to_string());
        assert!(err.stderr().is_none());
    }
}
