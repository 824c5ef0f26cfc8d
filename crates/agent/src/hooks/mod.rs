//! The hook pipeline.
//!
//! [`Hooks`] is a set of optional extension points invoked at fixed
//! places in an agent call. Every method has a default, so an
//! implementation overrides only what it needs and the loop never asks
//! whether a hook exists.
//!
//! Failure semantics differ by hook:
//!
//! | Hook | On `Err` |
//! |------|----------|
//! | `before_call`, `after_render`, `after_call` | the call fails (after `on_error`) |
//! | `prepare_tool_results`, `prepare_context`, `prepare_messages` | warning logged, original data used |
//! | `on_iteration_start` | the loop stops with that error |
//! | `on_iteration_complete` | warning logged, loop continues |
//!
//! The `prepare_*` hooks return `Ok(None)` to pass data through
//! unchanged and `Ok(Some(..))` to substitute it.
//!
//! `on_iteration_start` and `on_iteration_complete` default to the
//! built-in checks in [`defaults`] (max iterations, token limits). An
//! override that still wants them calls those functions itself.

pub mod chain;
pub mod defaults;

use crate::context::Context;
use crate::result::AgentResult;
use crate::settings::TokenLimits;
use ostinato_core::error::{Error, Result};
use ostinato_core::message::WireMessage;
use ostinato_core::provider::{ClientSpec, ToolSchema};
use ostinato_core::tool::{ToolCall, ToolResult};
use ostinato_core::usage::TokenUsage;
use ostinato_telemetry::Telemetry;
use serde_json::Value;

pub use chain::HookChain;

/// Call-wide values every loop hook can see.
#[derive(Debug, Clone)]
pub struct HookEnv {
    pub agent: String,
    pub client: ClientSpec,
    pub max_iterations: u32,
    pub token_limits: TokenLimits,
    pub telemetry: Telemetry,
}

/// The call as seen by `after_render`, `after_call` and `on_error`.
#[derive(Debug, Clone, Copy)]
pub struct CallInfo<'a> {
    pub agent: &'a str,
    pub input: &'a Value,
    /// Rendered prompt, if a template is configured and rendering got that far
    pub prompt: Option<&'a str>,
}

#[derive(Debug, Clone, Copy)]
pub struct ToolResultsInput<'a> {
    pub env: &'a HookEnv,
    pub tool_calls: &'a [ToolCall],
    pub results: &'a [ToolResult],
    pub context: &'a Context,
    pub usage: TokenUsage,
}

#[derive(Debug, Clone, Copy)]
pub struct ContextInput<'a> {
    pub env: &'a HookEnv,
    pub context: &'a Context,
    pub usage: TokenUsage,
    pub iteration: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct MessagesInput<'a> {
    pub env: &'a HookEnv,
    pub messages: &'a [WireMessage],
    pub context: &'a Context,
    pub tools: &'a [ToolSchema],
    pub iteration: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct IterationStart<'a> {
    pub env: &'a HookEnv,
    pub iteration: u32,
    pub context: &'a Context,
}

#[derive(Debug, Clone, Copy)]
pub struct IterationComplete<'a> {
    pub env: &'a HookEnv,
    pub iteration: u32,
    pub context: &'a Context,
    /// Tool results folded in this iteration
    pub results: &'a [ToolResult],
    pub usage: TokenUsage,
}

/// Extension points of an agent call.
pub trait Hooks: Send + Sync {
    /// Runs once before the prompt is rendered; may rewrite the input.
    fn before_call(&self, _agent: &str, input: Value) -> Result<Value> {
        Ok(input)
    }

    /// Runs once after rendering, before the first provider call.
    fn after_render(&self, _call: &CallInfo<'_>) -> Result<()> {
        Ok(())
    }

    /// Runs once with the final result; may transform it.
    fn after_call(&self, _call: &CallInfo<'_>, result: AgentResult) -> Result<AgentResult> {
        Ok(result)
    }

    /// Runs whenever the call fails. Returning `Ok` recovers the call.
    fn on_error(&self, _call: &CallInfo<'_>, error: Error) -> std::result::Result<AgentResult, Error> {
        Err(error)
    }

    fn prepare_tool_results(&self, _input: &ToolResultsInput<'_>) -> Result<Option<Vec<ToolResult>>> {
        Ok(None)
    }

    fn prepare_context(&self, _input: &ContextInput<'_>) -> Result<Option<Context>> {
        Ok(None)
    }

    fn prepare_messages(&self, _input: &MessagesInput<'_>) -> Result<Option<Vec<WireMessage>>> {
        Ok(None)
    }

    fn on_iteration_start(&self, input: &IterationStart<'_>) -> Result<()> {
        defaults::on_iteration_start(input)
    }

    fn on_iteration_complete(&self, input: &IterationComplete<'_>) -> Result<()> {
        defaults::on_iteration_complete(input)
    }
}

/// Hooks with every default in place.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl Hooks for DefaultHooks {}
