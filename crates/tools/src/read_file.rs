//! Read file tool — return a text file's contents.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::io::ErrorKind;

use crate::args;

/// Files above this size are refused; the model should narrow its request.
const MAX_READ_BYTES: u64 = 1024 * 1024;
const EXAMPLE: &str = r#"{"path": "src/main.rs"}"#;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

pub struct ReadFileTool;

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the specified path."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read. Can be absolute or relative to the current directory."
                }
            },
            "required": ["path"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        format!("→ Reading file: {}", args::str_field(input, "path"))
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: ReadFileArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "path", &params.path, EXAMPLE)?;
        let path = params.path.as_str();

        let metadata = tokio::fs::metadata(path).await.map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::NotFound => format!("file '{path}' does not exist. Use list_files to see available files"),
                ErrorKind::PermissionDenied => format!("permission denied reading '{path}'. Check file permissions"),
                _ => format!("cannot access '{path}': {e}"),
            };
            ToolError::failed(self.name(), reason)
        })?;

        if metadata.is_dir() {
            return Err(ToolError::failed(
                self.name(),
                format!("'{path}' is a directory. Use list_files to list its contents instead"),
            ));
        }

        if metadata.len() > MAX_READ_BYTES {
            return Err(ToolError::failed(
                self.name(),
                format!(
                    "file '{path}' is very large ({} KB). Consider using grep to find the relevant section, or run_bash with head/sed to read part of it",
                    metadata.len() / 1024
                ),
            ));
        }

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("failed to read file '{path}': {e}")))?;
        Ok(ToolOutput::Text(String::from_utf8_lossy(&bytes).into_owned()))
    }
}
