//! The agent runtime: prompt rendering, the tool-calling loop and its
//! hook pipeline, progressive disclosure, and the call/stream entry
//! points.
//!
//! A call with no tools is one provider round trip. A call with tools
//! runs the loop:
//!
//! 1. **Start** an iteration (hooks may halt here)
//! 2. **Prepare** the context and the outgoing messages
//! 3. **Send** the conversation to the provider
//! 4. **If tool calls**: execute them, fold the results into the context,
//!    start the next iteration
//! 5. **If text**: parse it against the output schema and return
//!
//! The loop ends on a final answer, an error, or when a hook halts it
//! (maximum iterations, token budget).

pub mod agent;
pub mod context;
pub mod disclosure;
pub mod hooks;
pub mod loop_runner;
pub mod prompt;
pub mod result;
pub mod schema;
pub mod settings;
pub mod stream;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use agent::{Agent, AgentBuilder, CallScope, agent_error};
pub use context::{Context, ContextOptions, Iteration, TokenEstimator};
pub use disclosure::{CompactionStrategy, Compactor, DisclosureHooks, DisclosureSettings, ResultProcessor};
pub use hooks::{DefaultHooks, HookChain, Hooks};
pub use loop_runner::{LoopState, ToolCallingLoop};
pub use prompt::{PromptRenderer, RenderConfig, TemplateRenderer};
pub use result::AgentResult;
pub use schema::{FieldSpec, OutputSchema};
pub use settings::{BudgetStrategy, LoopSettings, TokenLimits, ToolErrorPolicy};
pub use stream::{AgentStream, StreamItem};
