//! Configuration loading, validation, and management for patchwright.
//!
//! Loads configuration from `~/.patchwright/config.toml`, then applies a
//! `.env` file and environment variable overrides. Validates all settings at
//! startup.

pub mod prompt;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use prompt::SystemPrompt;

/// The root configuration structure.
///
/// Maps directly to `~/.patchwright/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Messages API endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Model identifier sent with every request
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Mark the request prefix as cacheable
    #[serde(default = "default_true")]
    pub prompt_cache: bool,

    /// Key for the web_search tool (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brave_search_api_key: Option<String>,

    /// Conversation loop limits
    #[serde(default)]
    pub agent: AgentSettings,

    /// System prompt source
    #[serde(default)]
    pub prompt: PromptSettings,
}

fn default_api_url() -> String {
    "https://api.anthropic.com/v1/messages".into()
}
fn default_model() -> String {
    "claude-sonnet-4-5-20250929".into()
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_true() -> bool {
    true
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("prompt_cache", &self.prompt_cache)
            .field("brave_search_api_key", &redact(&self.brave_search_api_key))
            .field("agent", &self.agent)
            .field("prompt", &self.prompt)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Model calls allowed for one user message
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,

    /// Upper bound for a single tool execution
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
}

fn default_max_rounds() -> u32 {
    25
}
fn default_tool_timeout_secs() -> u64 {
    300
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            tool_timeout_secs: default_tool_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptSettings {
    /// Read the system prompt from this file instead of the built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_file: Option<PathBuf>,
}

impl AppConfig {
    /// Load configuration from the default path (~/.patchwright/config.toml).
    ///
    /// A `.env` file is read first (`$ENV_PATH`, else `./.env`), then these
    /// environment variables override the file:
    /// - `PATCHWRIGHT_API_KEY` (highest priority), `ANTHROPIC_API_KEY`
    /// - `BRAVE_SEARCH_API_KEY`
    /// - `PATCHWRIGHT_MODEL`, `PATCHWRIGHT_API_URL`
    pub fn load() -> Result<Self, ConfigError> {
        load_dotenv()?;

        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("PATCHWRIGHT_API_KEY").or_else(|| non_empty("ANTHROPIC_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(key) = non_empty("BRAVE_SEARCH_API_KEY") {
            self.brave_search_api_key = Some(key);
        }
        if let Some(model) = non_empty("PATCHWRIGHT_MODEL") {
            self.model = model;
        }
        if let Some(url) = non_empty("PATCHWRIGHT_API_URL") {
            self.api_url = url;
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".patchwright")
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError("max_tokens must be greater than 0".into()));
        }

        if self.agent.max_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_rounds must be at least 1".into(),
            ));
        }

        if self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "agent.tool_timeout_secs must be at least 1".into(),
            ));
        }

        if !self.api_url.starts_with("http://") && !self.api_url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "api_url must be an http(s) URL, got '{}'",
                self.api_url
            )));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Generate a default config TOML string (for `config --init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            prompt_cache: true,
            brave_search_api_key: None,
            agent: AgentSettings::default(),
            prompt: PromptSettings::default(),
        }
    }
}

/// Read `$ENV_PATH` or `./.env` into the process environment.
///
/// A missing default `.env` is fine; a missing file named by `ENV_PATH` is
/// an error because the user asked for it explicitly.
fn load_dotenv() -> Result<(), ConfigError> {
    match std::env::var("ENV_PATH") {
        Ok(path) if !path.is_empty() => {
            let path = PathBuf::from(path);
            dotenvy::from_path(&path).map_err(|e| ConfigError::EnvFileError {
                path,
                reason: e.to_string(),
            })?;
        }
        _ => match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => {
                return Err(ConfigError::EnvFileError {
                    path: PathBuf::from(".env"),
                    reason: e.to_string(),
                });
            }
        },
    }
    Ok(())
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error(
        "Error loading .env file from '{path}': {reason}\n\nTo fix this:\n  \
         1. Create a .env file in the current directory, OR\n  \
         2. Set ENV_PATH to your .env file location"
    )]
    EnvFileError { path: PathBuf, reason: String },

    #[error("Failed to read system prompt from {path}: {reason}")]
    PromptError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
