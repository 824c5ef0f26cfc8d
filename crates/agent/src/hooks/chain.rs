//! Composition of several hook sets.

use super::{
    CallInfo, ContextInput, Hooks, IterationComplete, IterationStart, MessagesInput,
    ToolResultsInput,
};
use crate::context::Context;
use crate::result::AgentResult;
use ostinato_core::error::{Error, Result};
use ostinato_core::message::WireMessage;
use ostinato_core::tool::ToolResult;
use serde_json::Value;
use std::sync::Arc;

/// Runs hook sets in order.
///
/// Transforming hooks feed each member the previous member's output.
/// The first error stops the chain, except in `on_iteration_complete`
/// where every member runs and the first error is reported afterwards.
/// `on_error` offers the error to each member until one recovers.
#[derive(Clone, Default)]
pub struct HookChain {
    members: Vec<Arc<dyn Hooks>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.members.push(hooks);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl Hooks for HookChain {
    fn before_call(&self, agent: &str, input: Value) -> Result<Value> {
        self.members
            .iter()
            .try_fold(input, |input, hooks| hooks.before_call(agent, input))
    }

    fn after_render(&self, call: &CallInfo<'_>) -> Result<()> {
        self.members.iter().try_for_each(|hooks| hooks.after_render(call))
    }

    fn after_call(&self, call: &CallInfo<'_>, result: AgentResult) -> Result<AgentResult> {
        self.members
            .iter()
            .try_fold(result, |result, hooks| hooks.after_call(call, result))
    }

    fn on_error(&self, call: &CallInfo<'_>, error: Error) -> std::result::Result<AgentResult, Error> {
        let mut error = error;
        for hooks in &self.members {
            match hooks.on_error(call, error) {
                Ok(recovered) => return Ok(recovered),
                Err(next) => error = next,
            }
        }
        Err(error)
    }

    fn prepare_tool_results(&self, input: &ToolResultsInput<'_>) -> Result<Option<Vec<ToolResult>>> {
        let mut current: Option<Vec<ToolResult>> = None;
        for hooks in &self.members {
            let step = ToolResultsInput {
                results: current.as_deref().unwrap_or(input.results),
                ..*input
            };
            if let Some(next) = hooks.prepare_tool_results(&step)? {
                current = Some(next);
            }
        }
        Ok(current)
    }

    fn prepare_context(&self, input: &ContextInput<'_>) -> Result<Option<Context>> {
        let mut current: Option<Context> = None;
        for hooks in &self.members {
            let step = ContextInput {
                context: current.as_ref().unwrap_or(input.context),
                ..*input
            };
            if let Some(next) = hooks.prepare_context(&step)? {
                current = Some(next);
            }
        }
        Ok(current)
    }

    fn prepare_messages(&self, input: &MessagesInput<'_>) -> Result<Option<Vec<WireMessage>>> {
        let mut current: Option<Vec<WireMessage>> = None;
        for hooks in &self.members {
            let step = MessagesInput {
                messages: current.as_deref().unwrap_or(input.messages),
                ..*input
            };
            if let Some(next) = hooks.prepare_messages(&step)? {
                current = Some(next);
            }
        }
        Ok(current)
    }

    fn on_iteration_start(&self, input: &IterationStart<'_>) -> Result<()> {
        if self.members.is_empty() {
            return super::defaults::on_iteration_start(input);
        }
        self.members
            .iter()
            .try_for_each(|hooks| hooks.on_iteration_start(input))
    }

    fn on_iteration_complete(&self, input: &IterationComplete<'_>) -> Result<()> {
        if self.members.is_empty() {
            return super::defaults::on_iteration_complete(input);
        }
        let mut first_error = None;
        for hooks in &self.members {
            if let Err(e) = hooks.on_iteration_complete(input) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
