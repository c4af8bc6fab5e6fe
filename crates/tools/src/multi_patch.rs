//! Multi-file patch engine.
//!
//! Applies several single-file patches as one logical change. Patches run
//! strictly in order; on the first failure every already-patched file is
//! restored through the [`VersionControl`] capability. Without version
//! control nothing is restored and the report says exactly what changed.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use tracing::{info, warn};

use crate::args;
use crate::patch_file::{PatchReport, apply_patch};
use crate::vcs::{Git, TreeStatus, VersionControl};

const EXAMPLE: &str = r#"{"patches": [{"path": "src/a.rs", "old_text": "old_name", "new_text": "new_name"}, {"path": "src/b.rs", "old_text": "old_name", "new_text": "new_name"}]}"#;

/// One requested edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchSpec {
    pub path: String,
    pub old_text: String,
    pub new_text: String,
}

/// The patch that stopped the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPatch {
    /// 1-based position in the request.
    pub index: usize,
    pub total: usize,
    pub path: String,
    /// The single-file error, verbatim.
    pub error: String,
}

/// Result of a multi-file patch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MultiPatchOutcome {
    /// Every patch applied.
    Applied { reports: Vec<PatchReport>, tracked: bool },

    /// Tracked tree with uncommitted changes; nothing was applied.
    DirtyTree { paths: Vec<String> },

    /// A patch failed and every earlier change was restored.
    RolledBack {
        failed: FailedPatch,
        restored: Vec<String>,
        not_attempted: Vec<String>,
    },

    /// A patch failed and some restores failed too.
    PartiallyRolledBack {
        failed: FailedPatch,
        restored: Vec<String>,
        /// `(path, reason)` for files that still carry changes.
        unrestored: Vec<(String, String)>,
        not_attempted: Vec<String>,
    },

    /// A patch failed outside version control; earlier patches remain.
    FailedWithoutRollback {
        failed: FailedPatch,
        applied: Vec<String>,
        not_attempted: Vec<String>,
    },
}

impl MultiPatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Applied { .. } | Self::DirtyTree { .. })
    }
}

/// Check every spec before touching the filesystem.
pub fn validate(patches: &[PatchSpec]) -> Result<(), String> {
    if patches.is_empty() {
        return Err("multi_patch requires at least one patch".into());
    }
    for (i, patch) in patches.iter().enumerate() {
        if patch.path.is_empty() {
            return Err(format!("patch {} is missing 'path' parameter", i + 1));
        }
        if patch.old_text.is_empty() {
            return Err(format!("patch {} has an empty 'old_text'; it must be the exact text to replace", i + 1));
        }
    }
    Ok(())
}

/// Apply `patches` in order, rolling back through `vcs` on failure.
///
/// Callers must [`validate`] first.
pub async fn run(patches: &[PatchSpec], vcs: &dyn VersionControl) -> MultiPatchOutcome {
    let status = vcs.status().await;
    if status == TreeStatus::Dirty {
        return MultiPatchOutcome::DirtyTree {
            paths: patches.iter().map(|p| p.path.clone()).collect(),
        };
    }

    let total = patches.len();
    let mut reports: Vec<PatchReport> = Vec::with_capacity(total);

    for (i, patch) in patches.iter().enumerate() {
        let err = match apply_patch(Path::new(&patch.path), &patch.old_text, &patch.new_text).await {
            Ok(report) => {
                reports.push(report);
                continue;
            }
            Err(e) => e,
        };

        warn!(index = i + 1, total, path = %patch.path, error = %err, "multi_patch step failed");
        let failed = FailedPatch {
            index: i + 1,
            total,
            path: patch.path.clone(),
            error: err.to_string(),
        };
        let applied = distinct(patches[..i].iter().map(|p| p.path.as_str()));
        // A later patch to an already patched file is reported with `applied`.
        let not_attempted = distinct(
            patches[i + 1..]
                .iter()
                .map(|p| p.path.as_str())
                .filter(|path| !applied.iter().any(|a| a == path)),
        );

        if !status.is_tracked() {
            return MultiPatchOutcome::FailedWithoutRollback {
                failed,
                applied,
                not_attempted,
            };
        }

        let mut restored = Vec::new();
        let mut unrestored = Vec::new();
        for path in applied {
            match vcs.restore(Path::new(&path)).await {
                Ok(()) => restored.push(path),
                Err(reason) => unrestored.push((path, reason)),
            }
        }

        return if unrestored.is_empty() {
            MultiPatchOutcome::RolledBack {
                failed,
                restored,
                not_attempted,
            }
        } else {
            MultiPatchOutcome::PartiallyRolledBack {
                failed,
                restored,
                unrestored,
                not_attempted,
            }
        };
    }

    info!(patches = total, "multi_patch applied");
    MultiPatchOutcome::Applied {
        reports,
        tracked: status.is_tracked(),
    }
}

fn distinct<'a>(paths: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for path in paths {
        if !out.iter().any(|p| p == path) {
            out.push(path.to_string());
        }
    }
    out
}

fn write_list(f: &mut fmt::Formatter<'_>, paths: &[String]) -> fmt::Result {
    for path in paths {
        writeln!(f, "  - {path}")?;
    }
    Ok(())
}

fn write_failure(f: &mut fmt::Formatter<'_>, failed: &FailedPatch) -> fmt::Result {
    writeln!(f, "❌ Patch {}/{} FAILED: {}", failed.index, failed.total, failed.path)?;
    writeln!(f, "Error: {}", failed.error)?;
    writeln!(f)
}

fn write_not_attempted(f: &mut fmt::Formatter<'_>, paths: &[String]) -> fmt::Result {
    if paths.is_empty() {
        return Ok(());
    }
    writeln!(f)?;
    writeln!(f, "Not attempted (unchanged):")?;
    write_list(f, paths)
}

impl fmt::Display for MultiPatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied { reports, tracked } => {
                writeln!(f, "✅ Successfully applied all {} patches:", reports.len())?;
                writeln!(f)?;
                for (i, report) in reports.iter().enumerate() {
                    writeln!(f, "✓ Patch {}/{}: {report}", i + 1, reports.len())?;
                }
                if *tracked {
                    writeln!(f)?;
                    writeln!(f, "Next steps:")?;
                    writeln!(f, "  - Review changes: run_bash(\"git diff\")")?;
                    writeln!(f, "  - Commit changes: run_bash(\"git add -A && git commit -m 'Applied multi-patch'\")")?;
                }
                Ok(())
            }
            Self::DirtyTree { paths } => {
                writeln!(f, "⚠️  You have uncommitted changes. No patches were applied and no files were modified.")?;
                writeln!(f)?;
                writeln!(f, "Commit your work before applying multiple patches so a failure can be rolled back cleanly.")?;
                writeln!(f)?;
                writeln!(f, "To commit first:")?;
                writeln!(f, "  1. Review changes: run_bash(\"git status\")")?;
                writeln!(f, "  2. Commit changes: run_bash(\"git add -A && git commit -m 'Before multi-patch'\")")?;
                writeln!(f, "  3. Then run multi_patch again")?;
                writeln!(f)?;
                writeln!(f, "Ready to apply {} patches to:", paths.len())?;
                for (i, path) in paths.iter().enumerate() {
                    writeln!(f, "  {}. {path}", i + 1)?;
                }
                Ok(())
            }
            Self::RolledBack {
                failed,
                restored,
                not_attempted,
            } => {
                write_failure(f, failed)?;
                if restored.is_empty() {
                    writeln!(f, "No earlier patches were applied. No files were modified.")?;
                } else {
                    writeln!(f, "Rolled back {} successfully patched files:", restored.len())?;
                    write_list(f, restored)?;
                    writeln!(f, "✓ Successfully rolled back all changes. No files were modified.")?;
                }
                write_not_attempted(f, not_attempted)
            }
            Self::PartiallyRolledBack {
                failed,
                restored,
                unrestored,
                not_attempted,
            } => {
                write_failure(f, failed)?;
                if !restored.is_empty() {
                    writeln!(f, "Restored:")?;
                    write_list(f, restored)?;
                }
                writeln!(f, "⚠️  Some rollback operations failed. These files still contain changes:")?;
                for (path, reason) in unrestored {
                    writeln!(f, "  - {path}: {reason}")?;
                }
                writeln!(f)?;
                writeln!(f, "Restore them manually with:")?;
                for (path, _) in unrestored {
                    writeln!(f, "  git checkout -- {path}")?;
                }
                write_not_attempted(f, not_attempted)
            }
            Self::FailedWithoutRollback {
                failed,
                applied,
                not_attempted,
            } => {
                write_failure(f, failed)?;
                if applied.is_empty() {
                    writeln!(f, "No earlier patches were applied. No files were modified.")?;
                } else {
                    writeln!(
                        f,
                        "⚠️  {} files were patched before this failure and remain changed (not under version control, so nothing was rolled back):",
                        applied.len()
                    )?;
                    write_list(f, applied)?;
                    writeln!(f)?;
                    writeln!(f, "You may need to manually undo these changes.")?;
                }
                write_not_attempted(f, not_attempted)
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct MultiPatchArgs {
    patches: Vec<RawPatch>,
}

// Fields are optional here so a defect can be reported with its index.
#[derive(Debug, Deserialize)]
struct RawPatch {
    path: Option<String>,
    old_text: Option<String>,
    new_text: Option<String>,
}

fn to_specs(raw: Vec<RawPatch>) -> Result<Vec<PatchSpec>, String> {
    raw.into_iter()
        .enumerate()
        .map(|(i, p)| {
            let missing = |field: &str| format!("patch {} is missing '{field}' parameter", i + 1);
            Ok(PatchSpec {
                path: p.path.ok_or_else(|| missing("path"))?,
                old_text: p.old_text.ok_or_else(|| missing("old_text"))?,
                new_text: p.new_text.ok_or_else(|| missing("new_text"))?,
            })
        })
        .collect()
}

/// Exposes the engine to the model.
pub struct MultiPatchTool {
    vcs: Box<dyn VersionControl>,
}

impl MultiPatchTool {
    pub fn new(vcs: Box<dyn VersionControl>) -> Self {
        Self { vcs }
    }
}

impl Default for MultiPatchTool {
    fn default() -> Self {
        Self::new(Box::new(Git::current_dir()))
    }
}

#[async_trait]
impl Tool for MultiPatchTool {
    fn name(&self) -> &str {
        "multi_patch"
    }

    fn description(&self) -> &str {
        "Apply coordinated changes to multiple files atomically. If any patch fails, all previous changes are rolled \
         back using git. Best for refactoring function names, updating imports, or applying consistent changes across files."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "patches": {
                    "type": "array",
                    "description": "Array of patches to apply, in order",
                    "items": {
                        "type": "object",
                        "properties": {
                            "path": { "type": "string", "description": "The file path to patch" },
                            "old_text": { "type": "string", "description": "The exact text to find and replace in this file" },
                            "new_text": { "type": "string", "description": "The new text to replace old_text with" }
                        },
                        "required": ["path", "old_text", "new_text"]
                    }
                }
            },
            "required": ["patches"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        match input.get("patches").and_then(|v| v.as_array()) {
            Some(patches) => format!("→ Applying multi-patch: {} files", patches.len()),
            None => "→ Applying multi-patch".to_string(),
        }
    }

    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let invalid = |reason: String| ToolError::InvalidArguments {
            tool_name: self.name().to_string(),
            reason,
            example: EXAMPLE.to_string(),
        };

        let params: MultiPatchArgs = args::parse(self.name(), input, EXAMPLE)?;
        let specs = to_specs(params.patches).map_err(invalid)?;
        validate(&specs).map_err(invalid)?;

        let outcome = run(&specs, self.vcs.as_ref()).await;
        if outcome.is_success() {
            Ok(ToolOutput::Text(outcome.to_string()))
        } else {
            Err(ToolError::failed(self.name(), outcome.to_string()))
        }
    }
}
