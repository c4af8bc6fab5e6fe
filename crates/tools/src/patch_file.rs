//! Single-file patch — exact-match find/replace.
//!
//! `old_text` must occur exactly once in the file. Anything else leaves the
//! file untouched and explains how to fix the request.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::args;

const EXAMPLE: &str = r#"{"path": "src/main.rs", "old_text": "fn old_name()", "new_text": "fn new_name()"}"#;

/// Why a patch was not applied. The file is unchanged in every case.
#[derive(Debug, Error)]
pub enum PatchError {
    #[error(
        "file '{}' does not exist. Use write_file to create a new file, or use list_files to see available files",
        .path.display()
    )]
    FileNotFound { path: PathBuf },

    #[error(
        "The old_text was not found in '{}'. Common issues:\n  \
         1. Whitespace or newlines don't match exactly\n  \
         2. The text has already been changed\n  \
         3. There's a typo in old_text\n\n\
         Suggestions:\n  \
         - Use read_file first to see the current content\n  \
         - Copy the exact text including all whitespace\n  \
         - Check for tabs vs spaces, line endings, etc.",
        .path.display()
    )]
    TextNotFound { path: PathBuf },

    #[error(
        "The old_text appears {occurrences} times in '{}'. It must be unique to ensure the right text is replaced.\n\n\
         To fix this:\n  \
         1. Include more surrounding context in old_text\n  \
         2. Add nearby lines or unique identifiers\n\n\
         Use read_file to see the full context around each occurrence.",
        .path.display()
    )]
    TextNotUnique { path: PathBuf, occurrences: usize },

    #[error("old_text is required and cannot be empty. This is the text you want to replace")]
    EmptyOldText,

    #[error("{reason}")]
    Io { path: PathBuf, reason: String },
}

impl PatchError {
    fn io(path: &Path, action: &str, err: std::io::Error) -> Self {
        let reason = if err.kind() == ErrorKind::PermissionDenied {
            format!("permission denied {action} '{}'. Check file permissions", path.display())
        } else {
            format!("failed {action} '{}': {err}", path.display())
        };
        Self::Io {
            path: path.to_path_buf(),
            reason,
        }
    }
}

/// A successfully applied patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchReport {
    pub path: PathBuf,
    pub old_len: usize,
    pub new_len: usize,
}

impl PatchReport {
    /// Size change of the file in bytes.
    pub fn delta(&self) -> i64 {
        self.new_len as i64 - self.old_len as i64
    }
}

impl std::fmt::Display for PatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Successfully patched {}: replaced {} bytes with {} bytes (change: {:+} bytes)",
            self.path.display(),
            self.old_len,
            self.new_len,
            self.delta()
        )
    }
}

/// Replace the single occurrence of `old_text` in the file at `path`.
///
/// An empty `new_text` deletes the matched text.
pub async fn apply_patch(path: &Path, old_text: &str, new_text: &str) -> Result<PatchReport, PatchError> {
    if old_text.is_empty() {
        return Err(PatchError::EmptyOldText);
    }

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(PatchError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(PatchError::io(path, "reading", e)),
    };

    match content.matches(old_text).count() {
        0 => {
            return Err(PatchError::TextNotFound {
                path: path.to_path_buf(),
            });
        }
        1 => {}
        occurrences => {
            return Err(PatchError::TextNotUnique {
                path: path.to_path_buf(),
                occurrences,
            });
        }
    }

    let patched = content.replacen(old_text, new_text, 1);
    tokio::fs::write(path, patched)
        .await
        .map_err(|e| PatchError::io(path, "writing to", e))?;

    debug!(path = %path.display(), old_len = old_text.len(), new_len = new_text.len(), "Patched file");

    Ok(PatchReport {
        path: path.to_path_buf(),
        old_len: old_text.len(),
        new_len: new_text.len(),
    })
}

#[derive(Debug, Deserialize)]
struct PatchFileArgs {
    path: String,
    old_text: String,
    new_text: String,
}

/// Exposes [`apply_patch`] to the model.
pub struct PatchFileTool;

#[async_trait]
impl Tool for PatchFileTool {
    fn name(&self) -> &str {
        "patch_file"
    }

    fn description(&self) -> &str {
        "Edit a file by finding and replacing text. This is a patch-based approach that only requires the specific \
         text to change, not the entire file. To use: (1) use read_file to see current content, (2) identify a unique \
         string to replace, (3) provide the old text and new text. The old_text must match exactly and be unique in the file."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to edit. Can be absolute or relative to the current directory."
                },
                "old_text": {
                    "type": "string",
                    "description": "The exact text to find and replace. This must be unique in the file. Include enough context to make it unique (e.g., surrounding lines)."
                },
                "new_text": {
                    "type": "string",
                    "description": "The new text to replace old_text with. Can be empty string to delete the old text."
                }
            },
            "required": ["path", "old_text", "new_text"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        let delta = args::str_field(input, "new_text").len() as i64 - args::str_field(input, "old_text").len() as i64;
        format!("→ Patching file: {} ({delta:+} bytes)", args::str_field(input, "path"))
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: PatchFileArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "path", &params.path, EXAMPLE)?;
        args::require_non_empty(self.name(), "old_text", &params.old_text, EXAMPLE)?;

        let report = apply_patch(Path::new(&params.path), &params.old_text, &params.new_text)
            .await
            .map_err(|e| ToolError::failed(self.name(), e.to_string()))?;
        Ok(ToolOutput::Text(report.to_string()))
    }
}
