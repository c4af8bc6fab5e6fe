//! `patchwright config` — Show or initialise the configuration.

use std::path::Path;

use patchwright_config::{AppConfig, SystemPrompt};
use patchwright_config::prompt::PromptSource;

const REDACTED: &str = "[REDACTED]";

pub fn run(init: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = AppConfig::config_dir().join("config.toml");

    if init {
        write_default(&config_path)?;
        println!("  Wrote default configuration to {}", config_path.display());
        return Ok(());
    }

    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let prompt = SystemPrompt::load(&config)?;

    println!("# {}", config_path.display());
    println!("{}", render_redacted(&config)?);
    println!("# system prompt: {}", describe_source(&prompt.source));
    if !config.has_api_key() {
        println!("# no API key set (ANTHROPIC_API_KEY or PATCHWRIGHT_API_KEY)");
    }
    Ok(())
}

/// Serialise `config` as TOML with every secret replaced.
fn render_redacted(config: &AppConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if shown.api_key.is_some() {
        shown.api_key = Some(REDACTED.into());
    }
    if shown.brave_search_api_key.is_some() {
        shown.brave_search_api_key = Some(REDACTED.into());
    }
    toml::to_string_pretty(&shown)
}

fn describe_source(source: &PromptSource) -> String {
    match source {
        PromptSource::Configured(path) => format!("{} (configured)", path.display()),
        PromptSource::WorkingDirectory(path) => format!("{} (working directory)", path.display()),
        PromptSource::Embedded => "built-in".into(),
    }
}

/// Write the default configuration, refusing to replace an existing file.
fn write_default(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        return Err(format!(
            "{} already exists. Edit it directly, or move it aside and run `patchwright config --init` again.",
            path.display()
        )
        .into());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, AppConfig::default_toml())?;
    tracing::info!(path = %path.display(), "Wrote default config");
    Ok(())
}
