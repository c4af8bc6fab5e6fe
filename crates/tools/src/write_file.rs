//! Write file tool — create a file or replace a small one wholesale.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;

use crate::args;

/// Existing files above this size must be edited with patch_file.
const MAX_REPLACE_BYTES: u64 = 100 * 1024;
const EXAMPLE: &str = r#"{"path": "notes.txt", "content": "hello\n"}"#;

#[derive(Debug, Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

pub struct WriteFileTool;

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file. This will create a new file or completely replace the contents of an existing \
         file. Use this for creating new files or when you need to replace the entire file contents. For partial \
         edits, use patch_file instead."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to write to. Can be absolute or relative to the current directory."
                },
                "content": {
                    "type": "string",
                    "description": "The complete content to write to the file."
                }
            },
            "required": ["path", "content"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        let size = args::str_field(input, "content").len();
        format!(
            "→ Writing file: {} ({})",
            args::str_field(input, "path"),
            args::format_size(size)
        )
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: WriteFileArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "path", &params.path, EXAMPLE)?;
        let path = Path::new(&params.path);

        let existing = tokio::fs::metadata(path).await.ok().map(|m| m.len());
        if let Some(size) = existing
            && size > MAX_REPLACE_BYTES
        {
            return Err(ToolError::failed(
                self.name(),
                format!(
                    "Refusing to replace the entire contents of '{}' ({} KB).\n\n\
                     If you meant to edit part of the file, use patch_file instead.\n\
                     write_file completely replaces all existing content.",
                    params.path,
                    size / 1024
                ),
            ));
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty())
            && !tokio::fs::try_exists(parent).await.unwrap_or(false)
        {
            return Err(ToolError::failed(
                self.name(),
                format!(
                    "directory '{0}' does not exist. Create it first with: run_bash(\"mkdir -p {0}\")",
                    parent.display()
                ),
            ));
        }

        tokio::fs::write(path, &params.content).await.map_err(|e| {
            let reason = if e.kind() == ErrorKind::PermissionDenied {
                format!("permission denied writing to '{}'. Check directory and file permissions", params.path)
            } else {
                format!("failed to write file '{}': {e}", params.path)
            };
            ToolError::failed(self.name(), reason)
        })?;

        let summary = match existing {
            Some(old) => format!(
                "Successfully replaced contents of {} ({} bytes written, was {old} bytes)",
                params.path,
                params.content.len()
            ),
            None => format!("Successfully created {} ({} bytes written)", params.path, params.content.len()),
        };
        Ok(ToolOutput::Text(summary))
    }
}
