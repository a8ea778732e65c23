//! read_file tool - return a file's contents from the working tree

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::OperationKind;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Read a file's raw contents
pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &'static str {
        "read_file"
    }

    fn description(&self) -> &'static str {
        "Read a file's contents from the repository working tree."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!(?input, "ReadFileTool::execute: called");
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => return ToolResult::error("path is required"),
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::error(e.to_string()),
        };
        let relative = ctx.relative_path(&full_path);

        match tokio::fs::read(&full_path).await {
            Ok(bytes) => {
                debug!(bytes = bytes.len(), "ReadFileTool::execute: read");
                let size = bytes.len() as u64;
                let content = String::from_utf8_lossy(&bytes).into_owned();
                ToolResult::success(content).touching(OperationKind::Read, relative, Some(size))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("ReadFileTool::execute: file missing");
                ToolResult::error(format!("File not found: {}", relative)).touching(OperationKind::Read, relative, None)
            }
            Err(e) => {
                debug!(%e, "ReadFileTool::execute: read failed");
                ToolResult::error(format!("Failed to read file: {}", e)).touching(OperationKind::Read, relative, None)
            }
        }
    }
}
