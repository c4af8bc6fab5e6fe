//! `patchwright chat` — Interactive or single-message chat mode.

use std::sync::Arc;

use patchwright_agent::Agent;
use patchwright_config::{AppConfig, SystemPrompt};
use patchwright_core::{CancellationToken, DomainEvent, Error, EventBus};
use patchwright_providers::AnthropicProvider;
use patchwright_tools::{BuiltinOptions, default_registry};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables (or put it in a .env file):");
        eprintln!("    ANTHROPIC_API_KEY=sk-ant-...");
        eprintln!("    PATCHWRIGHT_API_KEY=sk-ant-...   (takes precedence)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        eprintln!("  Get a key at: https://console.anthropic.com/settings/keys");
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = AnthropicProvider::from_config(&config)?;
    let tools = Arc::new(default_registry(BuiltinOptions {
        brave_search_api_key: config.brave_search_api_key.clone(),
    })?);
    let prompt = SystemPrompt::load(&config)?;

    let event_bus = Arc::new(EventBus::default());
    let printer = spawn_progress_printer(&event_bus);

    let mut agent = Agent::new(Arc::new(provider), tools.clone(), prompt.text)
        .with_settings(&config.agent)
        .with_event_bus(event_bus);

    if let Some(msg) = message {
        // Single message mode
        let result = run_round(&mut agent, &msg).await;
        printer.abort();
        match result {
            Ok(reply) => println!("{reply}"),
            Err(e) => return Err(e.into()),
        }
        return Ok(());
    }

    println!();
    println!("  patchwright — interactive mode");
    println!();
    println!("  Model:     {}", config.model);
    println!("  Tools:     {}", tools.names().join(", "));
    println!();
    println!("  Type your message and press Enter.");
    println!("  Ctrl+C cancels a running request; 'exit', 'quit' or Ctrl+C at the prompt quits.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        use std::io::Write;
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input == "exit" || input == "quit" {
            break;
        }

        match run_round(&mut agent, input).await {
            Ok(reply) => {
                println!();
                for line in reply.lines() {
                    println!("  Assistant > {line}");
                }
                println!();
            }
            Err(Error::Cancelled) => {
                eprintln!();
                eprintln!("  [Cancelled] Send a new message to continue.");
                println!();
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    printer.abort();
    let usage = agent.usage();
    println!();
    println!(
        "  Tokens used: {} in, {} out ({} cached reads)",
        usage.input_tokens, usage.output_tokens, usage.cache_read_input_tokens
    );
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// Run one user message, cancelling it if Ctrl-C arrives before it finishes.
async fn run_round(agent: &mut Agent, input: &str) -> Result<String, Error> {
    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let result = agent.handle_message_with_cancel(input, &cancel).await;
    watcher.abort();
    result
}

/// Print tool progress and cache usage as the agent publishes them.
fn spawn_progress_printer(event_bus: &EventBus) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = progress_line(&event) {
                        println!("  {line}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Progress printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn progress_line(event: &DomainEvent) -> Option<String> {
    match event {
        DomainEvent::ToolStarted { display, .. } => Some(display.clone()),
        DomainEvent::ResponseReceived { usage, .. }
            if usage.cache_creation_input_tokens > 0 || usage.cache_read_input_tokens > 0 =>
        {
            Some(format!(
                "[cache] {} tokens written, {} tokens read",
                usage.cache_creation_input_tokens, usage.cache_read_input_tokens
            ))
        }
        DomainEvent::ErrorOccurred { context, error_message, .. } => {
            tracing::debug!(%context, %error_message, "Agent reported an error");
            None
        }
        _ => None,
    }
}
