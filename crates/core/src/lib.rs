//! # Ostinato Core
//!
//! Domain types, capability traits, and error definitions for the
//! Ostinato agent runtime. This crate has no framework dependencies; it
//! defines the model every other crate implements against.
//!
//! ## Design Philosophy
//!
//! External collaborators (LLM providers, action dispatchers, tool
//! functions) are traits here. Implementations are injected, which keeps
//! the tool-calling loop independent of any particular backend and
//! makes it trivial to test with scripted stand-ins.

pub mod error;
pub mod message;
pub mod provider;
pub mod registry;
pub mod tool;
pub mod usage;

// Re-export key types at crate root for ergonomics
pub use error::{AgentError, Error, ErrorKind, LlmError, ProviderError, Result};
pub use message::{ContentPart, Message, MessageContent, MessageToolCall, Role, WireMessage};
pub use provider::{
    CallContext, ChunkReceiver, ClientSpec, Provider, ProviderRequest, ProviderResponse,
    ResponseOutput, StreamChunk, TaggedPart, ToolSchema, chunk_stream,
};
pub use registry::Registry;
pub use tool::{
    ActionDispatcher, ActionRef, ParamType, ToolCall, ToolContext, ToolDefinition, ToolFailure,
    ToolFunction, ToolHandler, ToolParameter, ToolResult,
};
pub use usage::TokenUsage;
