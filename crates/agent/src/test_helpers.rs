//! Shared test helpers for agent tests.

use async_trait::async_trait;
use patchwright_core::{
    ContentBlock, JsonObject, Provider, ProviderError, ProviderRequest, ProviderResponse, StopReason, Tool,
    ToolContext, ToolError, ToolOutput, Usage,
};
use std::sync::Mutex;
use std::time::Duration;

/// A mock provider that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and keeps
/// a copy of the request. Panics if more calls are made than responses
/// provided.
pub struct SequentialMockProvider {
    responses: Mutex<Vec<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl SequentialMockProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    pub fn scripted(responses: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// The request of call `index` (zero-based).
    pub fn request(&self, index: usize) -> ProviderRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Provider for SequentialMockProvider {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let mut requests = self.requests.lock().unwrap();
        let mut responses = self.responses.lock().unwrap();
        let call = requests.len();
        requests.push(request);
        assert!(
            !responses.is_empty(),
            "SequentialMockProvider: no more responses (call #{call})"
        );
        responses.remove(0)
    }
}

fn response(content: Vec<ContentBlock>, stop_reason: StopReason) -> ProviderResponse {
    ProviderResponse {
        id: "msg_mock".into(),
        model: "mock-model".into(),
        content,
        stop_reason: Some(stop_reason),
        usage: Usage {
            input_tokens: 10,
            output_tokens: 5,
            cache_creation_input_tokens: 0,
            cache_read_input_tokens: 3,
        },
    }
}

/// Create a simple text response (no tool uses).
pub fn make_text_response(text: &str) -> ProviderResponse {
    response(vec![ContentBlock::text(text)], StopReason::EndTurn)
}

/// Create a response with optional thought text followed by tool uses.
pub fn make_tool_use_response(thought: &str, uses: Vec<ContentBlock>) -> ProviderResponse {
    let mut content = Vec::new();
    if !thought.is_empty() {
        content.push(ContentBlock::text(thought));
    }
    content.extend(uses);
    response(content, StopReason::ToolUse)
}

/// Helper to create a tool_use block.
pub fn make_tool_use(id: &str, name: &str, input: serde_json::Value) -> ContentBlock {
    ContentBlock::ToolUse {
        id: id.to_string(),
        name: name.to_string(),
        input: input.as_object().cloned().unwrap_or_default(),
    }
}

/// Echoes its `text` field.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }
    fn description(&self) -> &str {
        "Echoes back the input"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {"text": {"type": "string"}},
            "required": ["text"]
        })
    }
    fn display(&self, input: &JsonObject) -> String {
        format!("→ Echo: {}", input.get("text").and_then(|v| v.as_str()).unwrap_or(""))
    }
    async fn execute(&self, input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        match input.get("text").and_then(|v| v.as_str()) {
            Some(text) => Ok(ToolOutput::text(text)),
            None => Err(ToolError::InvalidArguments {
                tool_name: "echo".into(),
                reason: "missing field `text`".into(),
                example: r#"{"text": "hi"}"#.into(),
            }),
        }
    }
}

/// Sleeps far longer than any test timeout.
pub struct SleepyTool;

#[async_trait]
impl Tool for SleepyTool {
    fn name(&self) -> &str {
        "sleepy"
    }
    fn description(&self) -> &str {
        "Never finishes in time"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    fn display(&self, _input: &JsonObject) -> String {
        "→ Sleeping".into()
    }
    async fn execute(&self, _input: &JsonObject, _ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ToolOutput::text("woke up"))
    }
}

/// Fires the round's cancel token, then waits to be dropped.
pub struct CancellingTool;

#[async_trait]
impl Tool for CancellingTool {
    fn name(&self) -> &str {
        "cancel_me"
    }
    fn description(&self) -> &str {
        "Simulates the user pressing Ctrl-C mid-tool"
    }
    fn input_schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }
    fn display(&self, _input: &JsonObject) -> String {
        "→ Cancelling".into()
    }
    async fn execute(&self, _input: &JsonObject, ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        ctx.cancel.cancel();
        std::future::pending::<()>().await;
        Ok(ToolOutput::text("unreachable"))
    }
}
