//! Built-in tool implementations for patchwright.
//!
//! Tools give the agent the ability to work on a codebase: read, write and
//! patch files, search the tree, run bash commands, look things up on the
//! web, and pull images into the conversation.

pub mod args;
pub mod browse;
pub mod glob;
pub mod grep;
mod html;
pub mod include_file;
pub mod list_files;
pub mod multi_patch;
pub mod patch_file;
pub mod read_file;
pub mod run_bash;
pub mod vcs;
pub mod web_search;
pub mod write_file;

#[cfg(test)]
mod test_support;

use patchwright_core::{ToolError, ToolRegistry};

pub use include_file::{LoadError, LoadedImage, load_image};
pub use multi_patch::{MultiPatchOutcome, PatchSpec};
pub use patch_file::{PatchError, PatchReport, apply_patch};
pub use vcs::{Git, TreeStatus, VersionControl};

/// Settings for the tools that need more than their input.
#[derive(Debug, Clone, Default)]
pub struct BuiltinOptions {
    /// Brave Search key; `web_search` explains how to get one when absent.
    pub brave_search_api_key: Option<String>,
}

/// Create a registry holding every built-in tool.
pub fn default_registry(options: BuiltinOptions) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(read_file::ReadFileTool))?;
    registry.register(Box::new(write_file::WriteFileTool))?;
    registry.register(Box::new(list_files::ListFilesTool))?;
    registry.register(Box::new(patch_file::PatchFileTool))?;
    registry.register(Box::new(multi_patch::MultiPatchTool::default()))?;
    registry.register(Box::new(run_bash::RunBashTool))?;
    registry.register(Box::new(grep::GrepTool))?;
    registry.register(Box::new(glob::GlobTool))?;
    registry.register(Box::new(web_search::WebSearchTool::new(options.brave_search_api_key)))?;
    registry.register(Box::new(browse::BrowseTool::new()?))?;
    registry.register(Box::new(include_file::IncludeFileTool))?;
    Ok(registry)
}
