//! Provider plumbing for Ostinato.
//!
//! Concrete vendor clients live outside this workspace and implement
//! `ostinato_core::Provider`. This crate maps their native response
//! shapes onto one normalized form, resolves client specs to providers,
//! and ships the in-process providers (`echo`, scripted).

pub mod adapter;
pub mod registry;
pub mod scripted;

pub use adapter::{Extracted, decode_arguments, extract, synthesize_call_id, usage_of};
pub use registry::{BUILTIN_PROVIDERS, ProviderRegistry, ProviderResolver, builtin};
pub use scripted::{
    EchoProvider, ScriptedProvider, make_tool_call, text_response, tool_call_response,
};
