//! End-to-end tests for the patchwright pipeline.
//!
//! A wiremock server stands in for the Messages API; everything else is the
//! real stack: `AnthropicProvider`, the built-in tool registry and the
//! conversation loop, working on files in a temporary directory.

use std::sync::Arc;

use patchwright_agent::Agent;
use patchwright_config::{AgentSettings, AppConfig};
use patchwright_core::{DomainEvent, Error, EventBus, ProviderError};
use patchwright_providers::AnthropicProvider;
use patchwright_tools::{BuiltinOptions, default_registry};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ──────────────────────────────────────────────────────────────

fn message(content: Value, stop_reason: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "id": "msg_e2e",
        "type": "message",
        "role": "assistant",
        "model": "claude-test",
        "content": content,
        "stop_reason": stop_reason,
        "usage": {"input_tokens": 40, "output_tokens": 12, "cache_read_input_tokens": 30}
    }))
}

/// First call answers with `tool_uses`, every later call with `final_text`.
async fn mount_tool_then_text(server: &MockServer, tool_uses: Value, final_text: &str) {
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(message(tool_uses, "tool_use"))
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/messages"))
        .respond_with(message(json!([{"type": "text", "text": final_text}]), "end_turn"))
        .mount(server)
        .await;
}

fn agent_for(server: &MockServer) -> Agent {
    let config = AppConfig {
        api_key: Some("sk-ant-e2e".into()),
        api_url: format!("{}/v1/messages", server.uri()),
        ..AppConfig::default()
    };
    let provider = AnthropicProvider::from_config(&config).unwrap();
    let tools = default_registry(BuiltinOptions::default()).unwrap();
    Agent::new(Arc::new(provider), Arc::new(tools), "You are a coding assistant.").with_settings(&config.agent)
}

async fn request_bodies(server: &MockServer) -> Vec<Value> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|r| r.body_json::<Value>().unwrap())
        .collect()
}

/// The content blocks of the last message in a request body.
fn last_turn(body: &Value) -> &Vec<Value> {
    let messages = body["messages"].as_array().unwrap();
    messages.last().unwrap()["content"].as_array().unwrap()
}

// ── E2E: Patch a file ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_patch_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("greeting.rs");
    std::fs::write(&file, "fn greet() -> &'static str {\n    \"hello\"\n}\n").unwrap();

    let server = MockServer::start().await;
    mount_tool_then_text(
        &server,
        json!([
            {"type": "text", "text": "I'll update the greeting."},
            {"type": "tool_use", "id": "toolu_patch", "name": "patch_file", "input": {
                "path": file.to_str().unwrap(),
                "old_text": "\"hello\"",
                "new_text": "\"hello, world\""
            }}
        ]),
        "Done: the greeting now says hello, world.",
    )
    .await;

    let mut agent = agent_for(&server);
    let reply = agent.handle_message("Make the greeting friendlier").await.unwrap();

    assert_eq!(reply, "Done: the greeting now says hello, world.");
    assert_eq!(
        std::fs::read_to_string(&file).unwrap(),
        "fn greet() -> &'static str {\n    \"hello, world\"\n}\n"
    );

    let bodies = request_bodies(&server).await;
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["model"], AppConfig::default().model);
    assert_eq!(bodies[0]["cache_control"]["type"], "ephemeral");
    assert!(bodies[0]["tools"].as_array().unwrap().iter().any(|t| t["name"] == "patch_file"));

    let results = last_turn(&bodies[1]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["type"], "tool_result");
    assert_eq!(results[0]["tool_use_id"], "toolu_patch");
    assert!(results[0]["content"].as_str().unwrap().starts_with("Successfully patched"));
    assert!(results[0].get("is_error").is_none());

    // user, assistant(tool_use), user(tool_result), assistant(text)
    assert_eq!(agent.conversation().len(), 4);
    assert_eq!(agent.usage().cache_read_input_tokens, 60);
}

// ── E2E: Several tool uses in one turn ──────────────────────────────────

#[tokio::test]
async fn e2e_read_and_unknown_tool_in_one_turn() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("notes.txt");
    std::fs::write(&file, "remember the milk\n").unwrap();

    let server = MockServer::start().await;
    mount_tool_then_text(
        &server,
        json!([
            {"type": "tool_use", "id": "toolu_read", "name": "read_file", "input": {"path": file.to_str().unwrap()}},
            {"type": "tool_use", "id": "toolu_ghost", "name": "teleport", "input": {}}
        ]),
        "Your note says to remember the milk.",
    )
    .await;

    let mut agent = agent_for(&server);
    let reply = agent.handle_message("What does my note say?").await.unwrap();
    assert_eq!(reply, "Your note says to remember the milk.");

    let bodies = request_bodies(&server).await;
    let results = last_turn(&bodies[1]);
    assert_eq!(results.len(), 2);

    assert_eq!(results[0]["tool_use_id"], "toolu_read");
    assert!(results[0]["content"].as_str().unwrap().contains("remember the milk"));

    assert_eq!(results[1]["tool_use_id"], "toolu_ghost");
    assert_eq!(results[1]["is_error"], true);
    assert!(results[1]["content"].as_str().unwrap().contains("teleport"));
}

// ── E2E: Progress events ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_progress_events_reach_subscribers() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "a").unwrap();

    let server = MockServer::start().await;
    mount_tool_then_text(
        &server,
        json!([{"type": "tool_use", "id": "toolu_ls", "name": "list_files", "input": {
            "path": dir.path().to_str().unwrap()
        }}]),
        "One file.",
    )
    .await;

    let bus = Arc::new(EventBus::default());
    let mut rx = bus.subscribe();
    let mut agent = agent_for(&server).with_event_bus(bus);
    agent.handle_message("What's in there?").await.unwrap();

    let mut started = Vec::new();
    let mut responses = 0;
    while let Ok(event) = rx.try_recv() {
        match event.as_ref() {
            DomainEvent::ToolStarted { display, .. } => started.push(display.clone()),
            DomainEvent::ResponseReceived { usage, .. } => {
                responses += 1;
                assert_eq!(usage.cache_read_input_tokens, 30);
            }
            _ => {}
        }
    }
    assert_eq!(responses, 2);
    assert_eq!(started.len(), 1);
    assert!(started[0].starts_with("→ Listing files"));
}

// ── E2E: Gateway failures ───────────────────────────────────────────────

#[tokio::test]
async fn e2e_auth_failure_is_actionable_and_recoverable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "type": "error",
            "error": {"type": "authentication_error", "message": "invalid x-api-key"}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(message(json!([{"type": "text", "text": "Hi again."}]), "end_turn"))
        .mount(&server)
        .await;

    let mut agent = agent_for(&server);
    let err = agent.handle_message("Hello").await.unwrap_err();
    assert!(matches!(err, Error::Provider(ProviderError::AuthenticationFailed { .. })));
    let text = err.to_string();
    assert!(text.contains("invalid x-api-key"));
    assert!(text.contains("API key"));

    // No assistant turn was recorded, so the next message is still valid.
    assert_eq!(agent.conversation().len(), 1);
    assert_eq!(agent.handle_message("Hello?").await.unwrap(), "Hi again.");
    assert!(agent.conversation().check_tool_pairing().is_ok());
}

// ── E2E: Round limit ────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_round_limit_stops_a_looping_model() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(message(
            json!([{"type": "tool_use", "id": "toolu_again", "name": "glob", "input": {
                "pattern": "*.rs",
                "path": dir.path().to_str().unwrap()
            }}]),
            "tool_use",
        ))
        .mount(&server)
        .await;

    let mut agent = agent_for(&server).with_settings(&AgentSettings {
        max_rounds: 3,
        tool_timeout_secs: 30,
    });
    let reply = agent.handle_message("Find the Rust files").await.unwrap();

    assert!(reply.contains("3 rounds"));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    assert!(agent.conversation().check_tool_pairing().is_ok());
}
