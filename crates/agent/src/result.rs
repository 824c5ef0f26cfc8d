//! What an agent call returns.

use crate::context::Context;
use ostinato_core::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// The response parsed into the configured output type
    pub output: Value,
    /// Raw text of the final response
    pub content: String,
    /// Usage summed over every provider response
    pub usage: TokenUsage,
    /// Iterations run (1 on the simple path)
    pub iterations: u32,
    pub tool_calls_made: usize,
    /// Final conversation state; only set when the tool loop ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}
