//! List files tool — one directory level, with kind and size.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::io::ErrorKind;

use crate::args;

const EXAMPLE: &str = r#"{"path": "src"}"#;

#[derive(Debug, Default, Deserialize)]
struct ListFilesArgs {
    #[serde(default)]
    path: Option<String>,
}

struct Entry {
    name: String,
    is_dir: bool,
    is_symlink: bool,
    size: u64,
}

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List files and directories in a specified path, one entry per line with its kind and size."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The directory path to list. Use '.' for current directory. Defaults to current directory if not specified."
                }
            },
            "required": []
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        match args::str_field(input, "path") {
            "" | "." => "→ Listing files: . (current directory)".to_string(),
            path => format!("→ Listing files: {path}"),
        }
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: ListFilesArgs = args::parse(self.name(), input, EXAMPLE)?;
        let path = params.path.filter(|p| !p.is_empty()).unwrap_or_else(|| ".".to_string());

        let mut dir = tokio::fs::read_dir(&path).await.map_err(|e| {
            let reason = match e.kind() {
                ErrorKind::NotFound => format!(
                    "directory '{path}' does not exist. Use '.' for current directory or provide a valid path"
                ),
                ErrorKind::PermissionDenied => format!(
                    "permission denied accessing '{path}'. Check file permissions or try a different directory"
                ),
                ErrorKind::NotADirectory => format!("'{path}' is a file, not a directory. Use read_file to read it"),
                _ => format!("failed to list files in '{path}': {e}"),
            };
            ToolError::failed(self.name(), reason)
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| ToolError::failed(self.name(), format!("failed to list files in '{path}': {e}")))?
        {
            let file_type = entry.file_type().await.ok();
            let size = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
            entries.push(Entry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: file_type.is_some_and(|t| t.is_dir()),
                is_symlink: file_type.is_some_and(|t| t.is_symlink()),
                size,
            });
        }

        if entries.is_empty() {
            return Ok(ToolOutput::Text(format!("Directory '{path}' is empty")));
        }

        // Directories first, then files, each alphabetical.
        entries.sort_by(|a, b| b.is_dir.cmp(&a.is_dir).then_with(|| a.name.cmp(&b.name)));

        let mut out = format!("{path}: {} entries\n", entries.len());
        for entry in &entries {
            let line = if entry.is_dir {
                format!("dir   {}/\n", entry.name)
            } else if entry.is_symlink {
                format!("link  {}\n", entry.name)
            } else {
                format!("file  {} ({})\n", entry.name, args::format_size(entry.size as usize))
            };
            out.push_str(&line);
        }
        Ok(ToolOutput::Text(out))
    }
}
