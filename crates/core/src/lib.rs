//! # patchwright core
//!
//! Domain types, traits, and error definitions for the patchwright coding
//! assistant. This crate has **no transport dependencies**: it defines the
//! conversation model, the model gateway contract and the tool contract that
//! the other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every seam is a trait here. Implementations live in their own crates:
//! - `Provider` — the model gateway (Anthropic Messages API in `patchwright-providers`)
//! - `Tool` — side-effecting executors (in `patchwright-tools`)
//!
//! This keeps the agent loop testable with scripted providers and fake tools.

pub mod error;
pub mod event;
pub mod message;
pub mod provider;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result, ToolError};
pub use event::{DomainEvent, EventBus};
pub use message::{ContentBlock, Conversation, ConversationId, ImageSource, JsonObject, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, StopReason, ToolDefinition, Usage};
pub use tool::{Tool, ToolContext, ToolOutput, ToolRegistry};
pub use tokio_util::sync::CancellationToken;
