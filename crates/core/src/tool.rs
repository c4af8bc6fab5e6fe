//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act in the world:
//! read and patch files, run shell commands, search the web, etc.
//! A tool bundles the three things the loop needs: the definition advertised
//! to the model, the executor, and a display formatter for progress lines.

use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ToolError;
use crate::message::{JsonObject, Message};
use crate::provider::{Provider, ToolDefinition};

/// Successful tool output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutput {
    /// Plain text fed back to the model.
    Text(String),

    /// Raw image bytes; the agent embeds them as an image block.
    /// `source` is the path or URL the bytes came from.
    Image {
        source: String,
        media_type: String,
        data: Vec<u8>,
    },
}

impl ToolOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Image { .. } => None,
        }
    }

    /// The text recorded in the tool_result block for this output.
    pub fn summary(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Image {
                source,
                media_type,
                data,
            } => format!("Loaded image {source} ({media_type}, {:.1} KB)", data.len() as f64 / 1024.0),
        }
    }
}

/// What an executor gets besides its input.
pub struct ToolContext<'a> {
    /// The gateway, for tools that ask the model something themselves.
    pub provider: &'a dyn Provider,

    /// The conversation so far.
    pub history: &'a [Message],

    /// Fires when the user cancels the current round.
    pub cancel: &'a CancellationToken,
}

/// The core Tool trait.
///
/// Each tool (read_file, patch_file, multi_patch, run_bash, ...) implements
/// this trait. Tools are registered in the ToolRegistry and made available to
/// the agent loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "patch_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's input object.
    fn input_schema(&self) -> serde_json::Value;

    /// One-line progress message built from the raw input.
    ///
    /// Must never fail: missing or mistyped fields render empty.
    fn display(&self, input: &JsonObject) -> String;

    /// Execute the tool with the given input.
    async fn execute(&self, input: &JsonObject, ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the model.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

/// A registry of available tools.
///
/// Built once at startup and then shared read-only with the agent loop, which
/// uses it to:
/// 1. Get tool definitions to send to the model
/// 2. Look up tools when the model requests them
pub struct ToolRegistry {
    // Ordered so the advertised tool list is byte-stable across calls.
    tools: BTreeMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Fails if a tool with the same name is already
    /// registered; the existing registration is kept.
    pub fn register(&mut self, tool: Box<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        debug!(tool = %name, "Registered tool");
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Result<&dyn Tool, ToolError> {
        self.tools
            .get(name)
            .map(|t| t.as_ref())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))
    }

    /// Get all tool definitions (for sending to the model).
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.to_definition()).collect()
    }

    /// List all registered tool names.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
