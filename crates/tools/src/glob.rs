//! Glob tool — find files by name or path pattern.
//!
//! A pattern without `/` matches file names anywhere below the search root
//! (`*_test.rs`); a pattern with `/` matches the path relative to the root
//! (`**/src/*.rs`). Brace alternatives (`*.{rs,toml}`) are supported.

use async_trait::async_trait;
use globset::{GlobBuilder, GlobMatcher};
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::path::Path;
use walkdir::WalkDir;

use crate::args;

const EXAMPLE: &str = r#"{"pattern": "**/*.rs", "path": "crates"}"#;
const MAX_FILES: usize = 1000;

#[derive(Debug, Deserialize)]
struct GlobArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
}

pub struct GlobTool;

#[async_trait]
impl Tool for GlobTool {
    fn name(&self) -> &str {
        "glob"
    }

    fn description(&self) -> &str {
        "Find files matching patterns. More flexible than list_files for navigating projects. Returns file paths \
         that match the pattern. Useful for finding specific files in large codebases."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "File pattern to match. Examples: '**/*.rs' (all Rust files), '*_test.go' (test files), '*.md' (markdown files), '**/main.rs' (find main.rs anywhere)"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search. Defaults to current directory if not specified."
                }
            },
            "required": ["pattern"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        let path = match args::str_field(input, "path") {
            "" | "." => "current directory",
            other => other,
        };
        format!("→ Finding files: '{}' in {path}", args::str_field(input, "pattern"))
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: GlobArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "pattern", &params.pattern, EXAMPLE)?;
        let path = params.path.filter(|p| !p.is_empty()).unwrap_or_else(|| ".".to_string());

        let matcher = GlobBuilder::new(&params.pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| ToolError::InvalidArguments {
                tool_name: self.name().to_string(),
                reason: format!("invalid glob pattern '{}': {e}", params.pattern),
                example: EXAMPLE.to_string(),
            })?
            .compile_matcher();
        let by_name = !params.pattern.contains('/');

        if !tokio::fs::metadata(&path).await.is_ok_and(|m| m.is_dir()) {
            return Err(ToolError::failed(
                self.name(),
                format!("directory '{path}' does not exist. Use '.' for current directory or provide a valid path"),
            ));
        }

        let root = path.clone();
        let files = tokio::task::spawn_blocking(move || find(Path::new(&root), &matcher, by_name))
            .await
            .map_err(|e| ToolError::failed("glob", format!("search task failed: {e}")))?;

        if files.is_empty() {
            return Ok(ToolOutput::Text(no_files_advice(&params.pattern, &path)));
        }

        let mut out = format!("Found {} files matching '{}':\n\n{}\n", files.len(), params.pattern, files.join("\n"));
        if files.len() >= MAX_FILES {
            out.push_str(&format!("\n[stopped after {MAX_FILES} files; use a narrower pattern]\n"));
        }
        Ok(ToolOutput::Text(out))
    }
}

fn find(root: &Path, matcher: &GlobMatcher, by_name: bool) -> Vec<String> {
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    let mut files = Vec::new();
    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        let matched = if by_name {
            matcher.is_match(entry.file_name())
        } else {
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            matcher.is_match(relative)
        };
        if matched {
            files.push(entry.path().display().to_string());
            if files.len() >= MAX_FILES {
                break;
            }
        }
    }
    files
}

fn no_files_advice(pattern: &str, path: &str) -> String {
    [
        format!("No files found matching pattern '{pattern}' in {path}"),
        String::new(),
        "Suggestions:".into(),
        "  - Check if the pattern is correct".into(),
        "  - Try a broader pattern (e.g., '*.rs' instead of 'main.rs')".into(),
        "  - Use '**/dir/*.rs' to match on the path instead of the file name".into(),
        "  - Verify you're searching in the right directory".into(),
        String::new(),
        "Pattern examples:".into(),
        "  - '*.rs' - all Rust files, any depth".into(),
        "  - '**/src/*.rs' - Rust files directly inside any src directory".into(),
        "  - '*_test.go' - all Go test files".into(),
        "  - '*.{rs,toml}' - either extension".into(),
    ]
    .join("\n")
}
