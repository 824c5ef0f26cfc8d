//! Tool tables and dispatch for Ostinato agents.
//!
//! A [`ToolTable`] holds the tools an agent is configured with and
//! resolves the names an LLM asks for. A [`ToolDispatcher`] executes a
//! batch of calls against that table and turns every outcome, including
//! panics and unknown names, into a [`ToolResult`](ostinato_core::ToolResult).

pub mod dispatch;
pub mod function;
pub mod table;

pub use dispatch::ToolDispatcher;
pub use function::{FnTool, SyncFnTool, action_tool, function_tool, sync_tool};
pub use table::{ToolTable, normalize_name};
