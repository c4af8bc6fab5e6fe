//! Anthropic native provider implementation.
//!
//! Uses the Messages API directly:
//! - `x-api-key` header authentication (not Bearer)
//! - `anthropic-version` header
//! - System prompt as top-level field
//! - Native tool use with `tool_use` / `tool_result` / `image` content blocks
//! - Optional `cache_control` marker so the static prefix is cached

use async_trait::async_trait;
use patchwright_config::AppConfig;
use patchwright_core::error::ProviderError;
use patchwright_core::message::Message;
use patchwright_core::provider::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
const DEFAULT_MODEL: &str = "claude-sonnet-4-5-20250929";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Anthropic Messages API provider.
pub struct AnthropicProvider {
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    prompt_cache: bool,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with default model settings.
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_url: DEFAULT_API_URL.into(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            max_tokens: DEFAULT_MAX_TOKENS,
            prompt_cache: true,
            client,
        })
    }

    /// Build a provider from loaded configuration. Fails with setup guidance
    /// when no API key is available.
    pub fn from_config(config: &AppConfig) -> Result<Self, ProviderError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key found.\n\nSet PATCHWRIGHT_API_KEY (or ANTHROPIC_API_KEY) in your environment \
                 or in a .env file:\n  PATCHWRIGHT_API_KEY=your-anthropic-api-key-here\n\n\
                 Get your API key from: https://console.anthropic.com/"
                    .into(),
            )
        })?;

        Ok(Self::new(api_key)?
            .with_api_url(&config.api_url)
            .with_model(&config.model)
            .with_max_tokens(config.max_tokens)
            .with_prompt_cache(config.prompt_cache))
    }

    /// Send requests to a different endpoint (e.g., for testing or proxies).
    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_prompt_cache(mut self, enabled: bool) -> Self {
        self.prompt_cache = enabled;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_body<'a>(&'a self, request: &'a ProviderRequest) -> ApiRequest<'a> {
        ApiRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            cache_control: self.prompt_cache.then_some(CacheControl { kind: "ephemeral" }),
            system: &request.system,
            messages: &request.messages,
            tools: &request.tools,
        }
    }

    /// Prefer the API's own `error.message` over the raw body.
    fn error_message(body: &str) -> String {
        serde_json::from_str::<ApiErrorBody>(body)
            .ok()
            .map(|b| b.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.to_string())
    }
}

#[async_trait]
impl patchwright_core::Provider for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn complete(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError> {
        let body = self.build_body(&request);

        debug!(
            provider = "anthropic",
            model = %self.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Network(format!("failed to read response: {e}")))?;

        if !(200..300).contains(&status) {
            warn!(status, body = %text, "Anthropic API error");
            return Err(ProviderError::from_status(status, Self::error_message(&text)));
        }

        let parsed: ProviderResponse = serde_json::from_str(&text)
            .map_err(|e| ProviderError::InvalidResponse(format!("{e}\nResponse body: {text}")))?;

        debug!(
            model = %parsed.model,
            stop_reason = ?parsed.stop_reason,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            cache_read = parsed.usage.cache_read_input_tokens,
            "Received completion"
        );

        Ok(parsed)
    }
}

// --- Anthropic API types ---

#[derive(Debug, Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    cache_control: Option<CacheControl>,
    system: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "no_tools")]
    tools: &'a [ToolDefinition],
}

fn no_tools(tools: &&[ToolDefinition]) -> bool {
    tools.is_empty()
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: String,
}
