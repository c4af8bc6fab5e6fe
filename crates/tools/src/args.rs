//! Typed argument decoding and display helpers shared by the built-in tools.

use patchwright_core::{JsonObject, ToolError};
use serde::de::DeserializeOwned;

/// Decode raw tool input into a typed parameter struct.
///
/// Decoding failures name the offending field (serde's message does) and
/// carry a usage example for the model.
pub fn parse<T: DeserializeOwned>(tool: &str, input: &JsonObject, example: &str) -> Result<T, ToolError> {
    serde_json::from_value(serde_json::Value::Object(input.clone())).map_err(|e| ToolError::InvalidArguments {
        tool_name: tool.to_string(),
        reason: e.to_string(),
        example: example.to_string(),
    })
}

/// Reject an empty string field.
pub fn require_non_empty(tool: &str, field: &str, value: &str, example: &str) -> Result<(), ToolError> {
    if value.is_empty() {
        return Err(ToolError::InvalidArguments {
            tool_name: tool.to_string(),
            reason: format!("`{field}` is required and cannot be empty"),
            example: example.to_string(),
        });
    }
    Ok(())
}

/// Best-effort string field for display formatters.
pub fn str_field<'a>(input: &'a JsonObject, key: &str) -> &'a str {
    input.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

/// Shorten `text` to at most `max` characters, ending in "...".
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max.saturating_sub(3)).collect();
    format!("{kept}...")
}

/// Human-readable byte size: bytes, KB or MB.
pub fn format_size(size: usize) -> String {
    if size < 1024 {
        format!("{size} bytes")
    } else if size < 1024 * 1024 {
        format!("{:.1} KB", size as f64 / 1024.0)
    } else {
        format!("{:.1} MB", size as f64 / (1024.0 * 1024.0))
    }
}
