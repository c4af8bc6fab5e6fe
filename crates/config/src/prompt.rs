//! System prompt resolution.

use std::path::{Path, PathBuf};

use crate::{AppConfig, ConfigError};

const EMBEDDED_PROMPT: &str = include_str!("../prompts/system.txt");

/// Relative path checked in the working directory, so the prompt can be
/// iterated on without rebuilding.
pub const DEV_PROMPT_PATH: &str = "prompts/system.txt";

/// Where the active system prompt came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptSource {
    Configured(PathBuf),
    WorkingDirectory(PathBuf),
    Embedded,
}

#[derive(Debug, Clone)]
pub struct SystemPrompt {
    pub text: String,
    pub source: PromptSource,
}

impl SystemPrompt {
    /// Resolve the prompt for `config`, looking in the current directory for
    /// a development copy.
    pub fn load(config: &AppConfig) -> Result<Self, ConfigError> {
        Self::load_in(config, Path::new("."))
    }

    /// Resolution order: the configured file (must exist), then
    /// `<dir>/prompts/system.txt`, then the built-in prompt.
    pub fn load_in(config: &AppConfig, dir: &Path) -> Result<Self, ConfigError> {
        if let Some(path) = &config.prompt.system_prompt_file {
            let text = std::fs::read_to_string(path).map_err(|e| ConfigError::PromptError {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            return Ok(Self {
                text,
                source: PromptSource::Configured(path.clone()),
            });
        }

        let dev_path = dir.join(DEV_PROMPT_PATH);
        if let Ok(text) = std::fs::read_to_string(&dev_path) {
            tracing::debug!("Using system prompt from {}", dev_path.display());
            return Ok(Self {
                text,
                source: PromptSource::WorkingDirectory(dev_path),
            });
        }

        Ok(Self::embedded())
    }

    pub fn embedded() -> Self {
        Self {
            text: EMBEDDED_PROMPT.to_string(),
            source: PromptSource::Embedded,
        }
    }
}
