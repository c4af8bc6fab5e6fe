//! patchwright CLI — the main entry point.
//!
//! Commands:
//! - `chat`    — Interactive REPL or single-message mode (the default)
//! - `tools`   — List the built-in tools
//! - `config`  — Show the effective configuration or write a default file

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "patchwright",
    about = "patchwright — a terminal coding assistant that reads, patches and runs your code",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long)]
        message: Option<String>,
    },

    /// List the tools the assistant can use
    Tools,

    /// Show the effective configuration (secrets redacted)
    Config {
        /// Write a default config file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Quiet by default so log lines don't interleave with the conversation
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command.unwrap_or(Commands::Chat { message: None }) {
        Commands::Chat { message } => commands::chat::run(message).await?,
        Commands::Tools => commands::tools::run()?,
        Commands::Config { init } => commands::config_cmd::run(init)?,
    }

    Ok(())
}
