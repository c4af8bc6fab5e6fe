//! The agent loop implementation.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use patchwright_config::AgentSettings;
use patchwright_core::{
    CancellationToken, ContentBlock, Conversation, DomainEvent, Error, EventBus, JsonObject, Message, Provider,
    ProviderRequest, Role, ToolContext, ToolError, ToolOutput, ToolRegistry, Usage,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const CANCELLED_RESULT: &str = "Cancelled by user";

/// One tool_use block lifted out of an assistant turn.
struct ToolUse {
    id: String,
    name: String,
    input: JsonObject,
}

/// Owns one conversation and drives it against the model.
pub struct Agent {
    /// The model gateway
    provider: Arc<dyn Provider>,

    /// Tool registry, built once at startup
    tools: Arc<ToolRegistry>,

    system_prompt: String,

    conversation: Conversation,

    /// Event bus for progress and usage events
    event_bus: Arc<EventBus>,

    /// Model calls allowed per user message
    max_rounds: u32,

    /// Upper bound for one tool execution
    tool_timeout: Duration,

    /// Usage summed over the whole session
    usage: Usage,
}

impl Agent {
    /// Create an agent with default limits (25 rounds, 300 s per tool).
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>, system_prompt: impl Into<String>) -> Self {
        let defaults = AgentSettings::default();
        Self {
            provider,
            tools,
            system_prompt: system_prompt.into(),
            conversation: Conversation::new(),
            event_bus: Arc::new(EventBus::default()),
            max_rounds: defaults.max_rounds,
            tool_timeout: Duration::from_secs(defaults.tool_timeout_secs),
            usage: Usage::default(),
        }
    }

    /// Apply the `[agent]` section of the configuration.
    pub fn with_settings(self, settings: &AgentSettings) -> Self {
        self.with_max_rounds(settings.max_rounds)
            .with_tool_timeout(Duration::from_secs(settings.tool_timeout_secs))
    }

    pub fn with_max_rounds(mut self, max: u32) -> Self {
        self.max_rounds = max;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = timeout;
        self
    }

    /// Publish events on a shared bus instead of a private one.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Token usage accumulated over every model call so far.
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// Process one user message and return the model's final reply.
    pub async fn handle_message(&mut self, input: &str) -> Result<String, Error> {
        self.handle_message_with_cancel(input, &CancellationToken::new()).await
    }

    /// Like [`Agent::handle_message`], aborting the round once `cancel` fires.
    ///
    /// A gateway failure returns the error and leaves the history as it was
    /// after the last complete step. On cancellation every unfinished tool
    /// use is answered with an error result before `Error::Cancelled` is
    /// returned, so the next message continues a well-formed history.
    pub async fn handle_message_with_cancel(&mut self, input: &str, cancel: &CancellationToken) -> Result<String, Error> {
        self.conversation.push_user_text(input);
        info!(
            conversation_id = %self.conversation.id,
            messages = self.conversation.len(),
            "Processing user message"
        );

        let definitions = self.tools.definitions();

        for round in 1..=self.max_rounds {
            debug!(conversation_id = %self.conversation.id, round, "Agent loop round");

            let request = ProviderRequest::new(
                self.system_prompt.clone(),
                self.conversation.messages().to_vec(),
                definitions.clone(),
            );

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                response = self.provider.complete(request) => response,
            };
            let response = match response {
                Ok(response) => response,
                Err(e) => {
                    warn!(error = %e, round, "Model call failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "model call".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e.into());
                }
            };

            self.usage.add(&response.usage);
            self.event_bus.publish(DomainEvent::ResponseReceived {
                conversation_id: self.conversation.id.to_string(),
                model: response.model.clone(),
                round,
                usage: response.usage,
                timestamp: Utc::now(),
            });

            let assistant = Message::assistant(response.content);
            let uses: Vec<ToolUse> = assistant
                .tool_uses()
                .map(|(id, name, input)| ToolUse {
                    id: id.to_string(),
                    name: name.to_string(),
                    input: input.clone(),
                })
                .collect();

            if uses.is_empty() {
                let reply = assistant.joined_text();
                self.conversation.push(assistant);
                return Ok(reply);
            }

            debug!(tool_count = uses.len(), "Executing tool uses");
            self.conversation.push(assistant);

            let results = self.dispatch(&uses, cancel).await;
            self.conversation.push(Message {
                role: Role::User,
                content: results,
            });
            debug_assert!(
                self.conversation.check_tool_pairing().is_ok(),
                "tool results must answer the preceding assistant turn"
            );

            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
        }

        warn!(
            conversation_id = %self.conversation.id,
            max_rounds = self.max_rounds,
            "Round limit reached"
        );
        Ok(format!(
            "I stopped after {} rounds of tool use without reaching a final answer. \
             Send another message to let me continue, or give me more specific guidance.",
            self.max_rounds
        ))
    }

    /// Run every tool use in order and build the next user turn: one
    /// tool_result per use, then any images.
    async fn dispatch(&self, uses: &[ToolUse], cancel: &CancellationToken) -> Vec<ContentBlock> {
        let mut results = Vec::with_capacity(uses.len());
        let mut images = Vec::new();

        let ctx = ToolContext {
            provider: self.provider.as_ref(),
            history: self.conversation.messages(),
            cancel,
        };

        for call in uses {
            if cancel.is_cancelled() {
                results.push(ContentBlock::tool_result(&call.id, CANCELLED_RESULT, true));
                continue;
            }

            match self.run_tool(call, &ctx).await {
                Ok(output) => {
                    results.push(ContentBlock::tool_result(&call.id, output.summary(), false));
                    if let ToolOutput::Image { media_type, data, .. } = output {
                        images.push(ContentBlock::image_base64(media_type, STANDARD.encode(&data)));
                    }
                }
                Err(ToolError::Cancelled(_)) => {
                    results.push(ContentBlock::tool_result(&call.id, CANCELLED_RESULT, true));
                }
                Err(e) => {
                    results.push(ContentBlock::tool_result(&call.id, e.to_string(), true));
                }
            }
        }

        results.extend(images);
        results
    }

    /// Look up and execute one tool under the timeout and the cancel token.
    async fn run_tool(&self, call: &ToolUse, ctx: &ToolContext<'_>) -> Result<ToolOutput, ToolError> {
        let tool = match self.tools.get(&call.name) {
            Ok(tool) => tool,
            Err(e) => {
                warn!(tool = %call.name, "Model requested an unknown tool");
                return Err(e);
            }
        };

        self.event_bus.publish(DomainEvent::ToolStarted {
            tool_name: call.name.clone(),
            display: tool.display(&call.input),
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(ToolError::Cancelled(call.name.clone())),
            result = tokio::time::timeout(self.tool_timeout, tool.execute(&call.input, ctx)) => {
                result.unwrap_or_else(|_| Err(ToolError::Timeout {
                    tool_name: call.name.clone(),
                    timeout_secs: self.tool_timeout.as_secs(),
                }))
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Err(e) = &outcome {
            warn!(tool = %call.name, error = %e, "Tool execution failed");
        }
        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: outcome.is_ok(),
            duration_ms,
            timestamp: Utc::now(),
        });
        outcome
    }
}
