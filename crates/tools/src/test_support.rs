//! Shared fixtures for tool unit tests.

use async_trait::async_trait;
use patchwright_core::{
    CancellationToken, ContentBlock, JsonObject, Provider, ProviderError, ProviderRequest, ProviderResponse,
    StopReason, ToolContext, Usage,
};
use std::sync::Mutex;

/// Answers every request with the same text and remembers what it was asked.
pub struct CannedProvider {
    reply: String,
    pub requests: Mutex<Vec<ProviderRequest>>,
}

impl CannedProvider {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        let content = if self.reply.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(self.reply.clone())]
        };
        Ok(ProviderResponse {
            id: "msg_canned".into(),
            model: "canned-model".into(),
            content,
            stop_reason: Some(StopReason::EndTurn),
            usage: Usage::default(),
        })
    }
}

/// Owns everything a `ToolContext` borrows.
pub struct TestContext {
    pub provider: CannedProvider,
    pub cancel: CancellationToken,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_reply("")
    }

    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            provider: CannedProvider::new(reply),
            cancel: CancellationToken::new(),
        }
    }

    pub fn ctx(&self) -> ToolContext<'_> {
        ToolContext {
            provider: &self.provider,
            history: &[],
            cancel: &self.cancel,
        }
    }
}

pub fn input(value: serde_json::Value) -> JsonObject {
    value.as_object().cloned().unwrap_or_default()
}
