//! Shared fixtures for unit tests.

use ostinato_core::tool::{ParamType, ToolDefinition, ToolParameter};
use ostinato_telemetry::{MemorySink, Telemetry};
use ostinato_tools::sync_tool;
use serde_json::{Value, json};
use std::sync::Arc;

/// `greet(name)` → `{"greeting": "Hello, <name>"}`.
pub fn greet_tool() -> ToolDefinition {
    sync_tool(
        "greet",
        "Greets someone",
        vec![ToolParameter::required("name", ParamType::String, "Who")],
        |args, _ctx| {
            let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
            Ok(json!({ "greeting": format!("Hello, {name}") }))
        },
    )
}

/// Telemetry that records into a returned memory sink.
pub fn recording_telemetry() -> (Telemetry, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    (Telemetry::new(vec![sink.clone()]), sink)
}
