//! The conversation loop — the heart of patchwright.
//!
//! The agent follows a **Call → Dispatch → Observe** cycle:
//!
//! 1. **Receive** a user message and append it to the history
//! 2. **Call the model** with the system prompt, full history and tool list
//! 3. **If tool uses**: run each tool in order, append all results as one
//!    user turn, loop back to step 2
//! 4. **If text only**: join the text blocks and return them as the reply
//!
//! The loop is bounded by a round limit, a per-tool timeout and a
//! cancellation token.

pub mod loop_runner;

#[cfg(test)]
mod test_helpers;

pub use loop_runner::Agent;
