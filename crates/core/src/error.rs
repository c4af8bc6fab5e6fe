//! Error types for the patchwright domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum. Every message is written to
//! be read by a person (or by the model): it says what went wrong and what to
//! try next.

use thiserror::Error;

/// The top-level error type for all patchwright operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Gateway errors ---
    #[error("{0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Conversation protocol ---
    #[error("Conversation protocol violation: {0}")]
    Protocol(String),

    // --- Cancellation ---
    #[error("Cancelled by user. The conversation is intact; send a new message to continue.")]
    Cancelled,

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures of the model gateway. Each variant renders with guidance for
/// the person at the keyboard.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error(
        "API error (status 401): {message}\n\nAuthentication failed. Check your API key:\n  \
         - Verify PATCHWRIGHT_API_KEY (or ANTHROPIC_API_KEY) in your environment or .env file\n  \
         - Ensure the key starts with 'sk-ant-'\n  \
         - Generate a new key at https://console.anthropic.com/"
    )]
    AuthenticationFailed { message: String },

    #[error(
        "API error (status 429): {message}\n\nRate limit exceeded. Suggestions:\n  \
         - Wait a moment and try again\n  \
         - You may have hit your usage limit\n  \
         - Check your plan limits at https://console.anthropic.com/"
    )]
    RateLimited { message: String },

    #[error(
        "API error (status 400): {message}\n\nBad request. This may indicate:\n  \
         - Invalid tool parameters\n  \
         - Message format issues\n  \
         - Try a simpler request to test"
    )]
    BadRequest { message: String },

    #[error(
        "API error (status {status_code}): {message}\n\nThe model API had a server error. Suggestions:\n  \
         - This is usually temporary, try again in a moment\n  \
         - Check https://status.anthropic.com/ for service status"
    )]
    ServerError { status_code: u16, message: String },

    #[error("API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Failed to reach the model API: {0}\nCheck your internet connection.")]
    Network(String),

    #[error("Model API request timed out: {0}")]
    Timeout(String),

    #[error("Failed to parse the model API response: {0}")]
    InvalidResponse(String),

    #[error("Model gateway is not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to the matching variant.
    pub fn from_status(status_code: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status_code {
            401 => Self::AuthenticationFailed { message },
            429 => Self::RateLimited { message },
            400 => Self::BadRequest { message },
            500..=599 => Self::ServerError { status_code, message },
            _ => Self::ApiError { status_code, message },
        }
    }
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    NotFound(String),

    #[error("Tool '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Invalid arguments for {tool_name}: {reason}. Example: {example}")]
    InvalidArguments {
        tool_name: String,
        reason: String,
        example: String,
    },

    #[error("{reason}")]
    ExecutionFailed { tool_name: String, reason: String },

    #[error("Tool {tool_name} timed out after {timeout_secs}s")]
    Timeout { tool_name: String, timeout_secs: u64 },

    #[error("Tool {0} was cancelled by user")]
    Cancelled(String),
}

impl ToolError {
    /// Shorthand for an execution failure carrying an actionable message.
    pub fn failed(tool_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ExecutionFailed {
            tool_name: tool_name.into(),
            reason: reason.into(),
        }
    }
}
