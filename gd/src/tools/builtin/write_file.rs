//! write_file tool - replace a file's contents and stage it

use std::path::Path;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::domain::OperationKind;
use crate::tools::{Tool, ToolContext, ToolResult};

/// Write content to a file, creating parent directories if needed
pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &'static str {
        "write_file"
    }

    fn description(&self) -> &'static str {
        "Write content to a file, replacing it entirely. Creates parent directories if needed."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the repository root"
                },
                "contents": {
                    "type": "string",
                    "description": "New file contents"
                }
            },
            "required": ["path", "contents"]
        })
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> ToolResult {
        debug!("WriteFileTool::execute: called");
        let path = match input["path"].as_str() {
            Some(p) => p,
            None => {
                debug!("WriteFileTool::execute: missing path parameter");
                return ToolResult::error("path is required");
            }
        };

        let contents = match input["contents"].as_str() {
            Some(c) => c,
            None => {
                debug!("WriteFileTool::execute: missing contents parameter");
                return ToolResult::error("contents is required");
            }
        };

        let full_path = match ctx.validate_path(Path::new(path)) {
            Ok(p) => p,
            Err(e) => {
                debug!(%e, "WriteFileTool::execute: path validation failed");
                return ToolResult::error(e.to_string());
            }
        };
        let relative = ctx.relative_path(&full_path);

        if let Some(parent) = full_path.parent()
            && let Err(e) = tokio::fs::create_dir_all(parent).await
        {
            debug!(%e, "WriteFileTool::execute: failed to create parent directories");
            return ToolResult::error(format!("Failed to create directories: {}", e));
        }

        if let Err(e) = tokio::fs::write(&full_path, contents).await {
            debug!(%e, "WriteFileTool::execute: failed to write file");
            return ToolResult::error(format!("Failed to write file: {}", e));
        }

        let size = contents.len() as u64;
        if let Some(vcs) = ctx.vcs()
            && let Err(e) = vcs.stage_paths(std::slice::from_ref(&relative)).await
        {
            debug!(%e, "WriteFileTool::execute: staging failed");
            return ToolResult::error(format!("Wrote {} but failed to stage it: {}", relative, e)).touching(
                OperationKind::Write,
                relative,
                Some(size),
            );
        }

        debug!(bytes = size, "WriteFileTool::execute: file written");
        ToolResult::success(format!("Wrote {} bytes to {}", size, relative)).touching(
            OperationKind::Write,
            relative,
            Some(size),
        )
    }
}
