//! Bash tool — run a command line through `bash -c`.
//!
//! The child is killed when the round is cancelled or the agent's per-tool
//! timeout drops the future.

use async_trait::async_trait;
use patchwright_core::{JsonObject, Tool, ToolContext, ToolError, ToolOutput};
use serde::Deserialize;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::args;

const EXAMPLE: &str = r#"{"command": "ls -la"}"#;

#[derive(Debug, Deserialize)]
struct RunBashArgs {
    command: String,
}

pub struct RunBashTool;

#[async_trait]
impl Tool for RunBashTool {
    fn name(&self) -> &str {
        "run_bash"
    }

    fn description(&self) -> &str {
        "Execute arbitrary bash commands and return the output. Use this for running shell commands, scripts, \
         or any command-line operations."
    }

    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute. Can be any valid bash command or script."
                }
            },
            "required": ["command"]
        })
    }

    fn display(&self, input: &JsonObject) -> String {
        format!("→ Running bash: {}", args::truncate(args::str_field(input, "command"), 60))
    }

    async fn execute(&self, input: &JsonObject, ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let params: RunBashArgs = args::parse(self.name(), input, EXAMPLE)?;
        args::require_non_empty(self.name(), "command", &params.command, EXAMPLE)?;
        let command = params.command.as_str();

        debug!(command = %command, "Executing bash command");

        let child = Command::new("bash")
            .args(["-c", command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::failed(self.name(), format!("failed to execute command '{command}': {e}")))?;

        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| ToolError::failed(self.name(), format!("failed to execute command '{command}': {e}")))?,
            _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled(self.name().to_string())),
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        if output.status.success() {
            return Ok(ToolOutput::Text(combined));
        }

        let Some(code) = output.status.code() else {
            return Err(ToolError::failed(
                self.name(),
                format!("command '{command}' was terminated by a signal\n\nOutput:\n{combined}"),
            ));
        };
        warn!(command = %command, exit_code = code, "Command failed");
        Err(ToolError::failed(self.name(), failure_report(command, code, &combined)))
    }
}

/// Failure text with hints for the exit codes that have a usual meaning.
fn failure_report(command: &str, code: i32, output: &str) -> String {
    let mut lines = vec![
        format!("Command failed with exit code {code}: {command}"),
        String::new(),
        "Output:".to_string(),
        output.to_string(),
    ];

    let hints: &[&str] = match code {
        127 => &[
            "Exit code 127 typically means 'command not found'.",
            "Suggestions:",
            "  - Check if the command is installed",
            "  - Verify the command name is spelled correctly",
            "  - Try which <command> to see if it's in PATH",
        ],
        126 => &[
            "Exit code 126 typically means 'permission denied'.",
            "Suggestions:",
            "  - Check file/script permissions",
            "  - Try: chmod +x <script>",
        ],
        1 if command.contains("test") => &["This may indicate test failures. Check the output above for details."],
        1 if command.contains("git") => &[
            "Git command failed. Check the output above for details.",
            "Common issues: uncommitted changes, merge conflicts, or invalid references.",
        ],
        _ => &[],
    };

    if !hints.is_empty() {
        lines.push(String::new());
        lines.extend(hints.iter().map(|h| h.to_string()));
    }
    lines.join("\n")
}
