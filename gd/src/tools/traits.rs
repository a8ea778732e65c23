//! Tool trait definition

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::context::ToolContext;
use crate::domain::OperationKind;

/// A tool that can be called by a bot
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (matches the bot's tool call name)
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON Schema for input parameters
    fn input_schema(&self) -> Value;

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult;
}

/// The file a tool call acted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Touched {
    pub kind: OperationKind,
    /// Path relative to the repository root
    pub path: String,
    /// Bytes read or written; `None` when the file was missing
    pub size: Option<u64>,
}

/// Result of a tool execution
#[derive(Debug, Clone)]
pub struct ToolResult {
    pub content: String,
    pub is_error: bool,
    /// Set when the call got far enough to act on a file
    pub touched: Option<Touched>,
}

impl ToolResult {
    pub fn success(content: impl Into<String>) -> Self {
        debug!("ToolResult::success: called");
        Self {
            content: content.into(),
            is_error: false,
            touched: None,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        debug!("ToolResult::error: called");
        Self {
            content: content.into(),
            is_error: true,
            touched: None,
        }
    }

    pub fn touching(mut self, kind: OperationKind, path: impl Into<String>, size: Option<u64>) -> Self {
        self.touched = Some(Touched {
            kind,
            path: path.into(),
            size,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_result_success() {
        let result = ToolResult::success("Wrote 3 bytes");
        assert!(!result.is_error);
        assert!(result.touched.is_none());
    }

    #[test]
    fn test_tool_result_touching() {
        let result = ToolResult::error("File not found: a.txt").touching(OperationKind::Read, "a.txt", None);
        assert!(result.is_error);
        assert_eq!(
            result.touched,
            Some(Touched {
                kind: OperationKind::Read,
                path: "a.txt".to_string(),
                size: None,
            })
        );
    }
}
