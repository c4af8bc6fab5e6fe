//! Model gateway implementations for patchwright.
//!
//! All providers implement the `patchwright_core::Provider` trait. The agent
//! only ever talks to that trait, so tests swap in scripted providers.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
