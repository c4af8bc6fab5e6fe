//! Grep tool — recursive regex search over a directory tree.

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::Path;
use walkdir::WalkDir;

use crate::args;

const EXAMPLE: &str = r#"{"pattern": "fn main", "path": "src", "file_pattern": "*.rs"}"#;
const MAX_MATCHES: usize = 1000;
/// Bytes inspected for a NUL when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8000;

#[derive(Debug, Deserialize)]
struct GrepArgs {
    pattern: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    file_pattern: Option<String>,
}

#[derive(Debug)]
struct Hit {
    file: String,
    line_number: usize,
    line: String,
}

pub struct GrepTool;

#[async_trait]
impl Tool for GrepTool {
    fn name(&self) -> &str {
        "grep"
    }

    fn description(&self) -> &str {
        "Search for patterns across multiple files. Returns file paths and matching lines with line numbers. \
         Useful for finding function definitions, variable references, TODO comments, error messages, and \
         configuration values."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "The search pattern (text or regex). Example: 'fn main', 'TODO', 'error:'"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search. Defaults to current directory if not specified."
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Optional: filter by file name using glob syntax. Example: '*.rs', '*.md', 'test_*.py'"
                }
            },
            "required": ["pattern"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        let pattern = args::str_field(input, "pattern");
        let path = match args::str_field(input, "path") {
            "" | "." => "current directory",
            other => other,
        };
        match args::str_field(input, "file_pattern") {
            "" => format!("→ Searching: '{pattern}' in {path}"),
            file_pattern => format!("→ Searching: '{pattern}' in {path} ({file_pattern})"),
        }
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: GrepArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "pattern", &params.pattern, EXAMPLE)?;

        let path = params.path.filter(|p| !p.is_empty()).unwrap_or_else(|| ".".to_string());
        let file_pattern = params.file_pattern.filter(|p| !p.is_empty());

        let regex = Regex::new(&params.pattern).map_err(|e| ToolError::InvalidArguments {
            tool_name: self.name().to_string(),
            reason: format!("invalid regex pattern '{}': {e}", params.pattern),
            example: EXAMPLE.to_string(),
        })?;
        let matcher = file_pattern
            .as_deref()
            .map(|p| Glob::new(p).map(|g| g.compile_matcher()))
            .transpose()
            .map_err(|e| ToolError::InvalidArguments {
                tool_name: self.name().to_string(),
                reason: format!("invalid file_pattern: {e}"),
                example: EXAMPLE.to_string(),
            })?;

        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Err(ToolError::failed(
                self.name(),
                format!("directory '{path}' does not exist. Use '.' for current directory or provide a valid path"),
            ));
        }

        let root = path.clone();
        let hits = tokio::task::spawn_blocking(move || search(Path::new(&root), &regex, matcher.as_ref()))
            .await
            .map_err(|e| ToolError::failed("grep", format!("search task failed: {e}")))?;

        if hits.is_empty() {
            return Ok(ToolOutput::Text(no_match_advice(&params.pattern, &path, file_pattern.as_deref())));
        }

        let files: BTreeSet<&str> = hits.iter().map(|h| h.file.as_str()).collect();
        let mut out = format!("Found {} matches in {} files:\n\n", hits.len(), files.len());
        for hit in &hits {
            let _ = writeln!(out, "{}:{}:{}", hit.file, hit.line_number, hit.line);
        }
        if hits.len() >= MAX_MATCHES {
            let _ = writeln!(out, "\n[stopped after {MAX_MATCHES} matches; narrow the pattern or path]");
        }
        Ok(ToolOutput::Text(out))
    }
}

/// Walk `root` and collect matching lines in path order. Unreadable entries,
/// `.git` directories and binary files are skipped.
fn search(root: &Path, regex: &Regex, matcher: Option<&GlobMatcher>) -> Vec<Hit> {
    let mut hits = Vec::new();
    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker.filter_map(Result::ok) {
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(m) = matcher
            && !m.is_match(entry.file_name())
        {
            continue;
        }
        let Ok(bytes) = std::fs::read(entry.path()) else {
            continue;
        };
        if bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0) {
            continue;
        }

        let text = String::from_utf8_lossy(&bytes);
        let file = entry.path().display().to_string();
        for (idx, line) in text.lines().enumerate() {
            if regex.is_match(line) {
                hits.push(Hit {
                    file: file.clone(),
                    line_number: idx + 1,
                    line: line.to_string(),
                });
                if hits.len() >= MAX_MATCHES {
                    return hits;
                }
            }
        }
    }
    hits
}

fn no_match_advice(pattern: &str, path: &str, file_pattern: Option<&str>) -> String {
    let mut lines = vec![format!("No matches found for pattern '{pattern}' in {path}")];
    if let Some(fp) = file_pattern {
        lines.push(format!("(searching files matching '{fp}')"));
    }
    lines.extend([
        String::new(),
        "Suggestions:".to_string(),
        "  - Check if the pattern is spelled correctly".to_string(),
        "  - Try a simpler or broader search pattern".to_string(),
        "  - Verify you're searching in the right directory".to_string(),
    ]);
    if file_pattern.is_some() {
        lines.push("  - Check if the file pattern matches existing files".to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{TestContext, input};

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.rs"), "fn main() {\n    // TODO: wire up\n}\n").unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn helper() {}\n// TODO later\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "TODO: docs\n").unwrap();
        std::fs::write(dir.path().join("blob.bin"), b"TODO\0\x01\x02").unwrap();
        dir
    }

    #[tokio::test]
    async fn counts_matches_and_files() {
        let dir = fixture();
        let harness = TestContext::new();
        let output = GrepTool
            .execute(
                &input(serde_json::json!({"pattern": "TODO", "path": dir.path().to_str().unwrap()})),
                &harness.ctx(),
            )
            .await
            .unwrap();
        let text = output.as_text().unwrap();
        assert!(text.starts_with("Found 3 matches in 3 files:"), "{text}");
        assert!(text.contains("main.rs:2:    // TODO: wire up"));
        assert!(!text.contains("blob.bin"));
    }

    #[tokio::test]
    async fn file_pattern_filters_by_name() {
        let dir = fixture();
        let harness = TestContext::new();
        let output = GrepTool
            .execute(
                &input(serde_json::json!({
                    "pattern": "TODO",
                    "path": dir.path().to_str().unwrap(),
                    "file_pattern": "*.rs"
                })),
                &harness.ctx(),
            )
            .await
            .unwrap();
        let text = output.as_text().unwrap();
        assert!(text.starts_with("Found 2 matches in 2 files:"));
        assert!(!text.contains("README.md"));
    }

    #[tokio::test]
    async fn regex_patterns_work() {
        let dir = fixture();
        let harness = TestContext::new();
        let output = GrepTool
            .execute(
                &input(serde_json::json!({"pattern": r"fn \w+\(\)", "path": dir.path().to_str().unwrap()})),
                &harness.ctx(),
            )
            .await
            .unwrap();
        assert!(output.as_text().unwrap().starts_with("Found 2 matches in 2 files:"));
    }

    #[tokio::test]
    async fn no_match_gives_advice() {
        let dir = fixture();
        let harness = TestContext::new();
        let output = GrepTool
            .execute(
                &input(serde_json::json!({
                    "pattern": "nonexistent_symbol",
                    "path": dir.path().to_str().unwrap(),
                    "file_pattern": "*.rs"
                })),
                &harness.ctx(),
            )
            .await
            .unwrap();
        let text = output.as_text().unwrap();
        assert!(text.starts_with("No matches found for pattern 'nonexistent_symbol'"));
        assert!(text.contains("Check if the file pattern matches existing files"));
    }

    #[tokio::test]
    async fn invalid_regex_is_an_argument_error() {
        let harness = TestContext::new();
        let result = GrepTool
            .execute(&input(serde_json::json!({"pattern": "("})), &harness.ctx())
            .await;
        assert!(matches!(result, Err(ToolError::InvalidArguments { .. })));
    }

    #[tokio::test]
    async fn missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let harness = TestContext::new();
        let err = GrepTool
            .execute(
                &input(serde_json::json!({"pattern": "x", "path": dir.path().join("gone").to_str().unwrap()})),
                &harness.ctx(),
            )
            .await
            .unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn display_variants() {
        assert_eq!(
            GrepTool.display(&input(serde_json::json!({"pattern": "TODO"}))),
            "→ Searching: 'TODO' in current directory"
        );
        assert_eq!(
            GrepTool.display(&input(serde_json::json!({"pattern": "TODO", "path": "src", "file_pattern": "*.rs"}))),
            "→ Searching: 'TODO' in src (*.rs)"
        );
    }
}
