//! Batch tool dispatch.
//!
//! Every call in a batch produces exactly one [`ToolResult`], in call
//! order. Nothing escapes this boundary: unknown tools, missing
//! arguments, tool errors and tool panics all become per-call failures.

use futures::FutureExt;
use futures::future::join_all;
use ostinato_core::tool::{
    ActionDispatcher, ToolCall, ToolContext, ToolDefinition, ToolFailure, ToolHandler, ToolResult,
};
use ostinato_telemetry::{Telemetry, TelemetryEvent, names};
use serde_json::{Map, Value};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::table::ToolTable;

pub struct ToolDispatcher {
    table: Arc<ToolTable>,
    actions: Option<Arc<dyn ActionDispatcher>>,
    concurrent: bool,
    telemetry: Telemetry,
}

impl ToolDispatcher {
    pub fn new(table: Arc<ToolTable>) -> Self {
        Self {
            table,
            actions: None,
            concurrent: true,
            telemetry: Telemetry::disabled(),
        }
    }

    /// Attach the dispatcher used for action-backed tools.
    pub fn with_action_dispatcher(mut self, actions: Arc<dyn ActionDispatcher>) -> Self {
        self.actions = Some(actions);
        self
    }

    /// Run a batch's calls concurrently (default) or one after another.
    pub fn with_concurrency(mut self, enabled: bool) -> Self {
        self.concurrent = enabled;
        self
    }

    pub fn with_telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn table(&self) -> &ToolTable {
        &self.table
    }

    /// Execute a batch. Results come back in call order regardless of
    /// completion order.
    pub async fn execute_all(&self, calls: &[ToolCall], context: &ToolContext) -> Vec<ToolResult> {
        debug!(count = calls.len(), concurrent = self.concurrent, "Dispatching tool calls");
        if self.concurrent {
            join_all(calls.iter().map(|call| self.execute(call, context))).await
        } else {
            let mut results = Vec::with_capacity(calls.len());
            for call in calls {
                results.push(self.execute(call, context).await);
            }
            results
        }
    }

    /// Execute a single call.
    pub async fn execute(&self, call: &ToolCall, context: &ToolContext) -> ToolResult {
        let Some(tool) = self.table.resolve(&call.name) else {
            warn!(tool = %call.name, "Tool not found");
            return ToolResult::error(&call.id, format!("Tool {} not found", call.name));
        };

        let missing = tool.missing_parameters(&call.arguments);
        if !missing.is_empty() {
            return ToolResult::error(
                &call.id,
                format!("Missing required parameters: {}", missing.join(", ")),
            );
        }

        let start = Instant::now();
        let invocation = self.invoke(tool, call.arguments.clone(), context);
        let outcome = match AssertUnwindSafe(invocation).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(payload) => Err(ToolFailure::Message(panic_message(payload.as_ref()))),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        if let Err(failure) = &outcome {
            warn!(tool = %tool.name, call_id = %call.id, error = %failure, "Tool execution failed");
        }

        self.telemetry.emit(
            TelemetryEvent::new(names::TOOL_EXECUTE)
                .measure("duration", duration_ms)
                .meta("tool", tool.name.as_str())
                .meta("agent", context.agent.as_str())
                .meta("status", if outcome.is_ok() { "ok" } else { "error" }),
        );

        ToolResult {
            tool_call_id: call.id.clone(),
            outcome,
        }
    }

    async fn invoke(
        &self,
        tool: &ToolDefinition,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<Value, ToolFailure> {
        match &tool.handler {
            ToolHandler::Function(f) => f.invoke(arguments, context).await,
            ToolHandler::Action(action) => match &self.actions {
                Some(dispatcher) => dispatcher.dispatch(action, arguments, context).await,
                None => Err(ToolFailure::Message(format!(
                    "No action dispatcher configured for {action}"
                ))),
            },
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::{action_tool, function_tool, sync_tool};
    use async_trait::async_trait;
    use ostinato_core::tool::{ActionRef, ParamType, ToolParameter};
    use ostinato_telemetry::MemorySink;
    use serde_json::json;
    use std::time::Duration;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn greet_table() -> ToolTable {
        ToolTable::from_definitions(vec![sync_tool(
            "greet",
            "Greets someone",
            vec![ToolParameter::required("name", ParamType::String, "Who to greet")],
            |args, _ctx| {
                let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
                Ok(json!({ "greeting": format!("Hello, {name}") }))
            },
        )])
    }

    #[tokio::test]
    async fn greets_by_name() {
        let dispatcher = ToolDispatcher::new(Arc::new(greet_table()));
        let calls = vec![ToolCall::new("call_1", "greet", args(json!({"name": "Alice"})))];
        let results = dispatcher.execute_all(&calls, &ToolContext::default()).await;
        assert_eq!(
            results,
            vec![ToolResult::ok("call_1", json!({"greeting": "Hello, Alice"}))]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_an_error_result() {
        let dispatcher = ToolDispatcher::new(Arc::new(greet_table()));
        let calls = vec![ToolCall::new("c", "launch_rockets", Map::new())];
        let results = dispatcher.execute_all(&calls, &ToolContext::default()).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].tool_call_id, "c");
        let err = results[0].outcome.as_ref().unwrap_err();
        assert!(err.reason().contains("launch_rockets"));
        assert!(err.reason().contains("not found"));
    }

    #[tokio::test]
    async fn missing_required_parameter_is_reported() {
        let table = ToolTable::from_definitions(vec![sync_tool(
            "strict",
            "",
            vec![ToolParameter::required("required_field", ParamType::String, "")],
            |_args, _ctx| Ok(json!("unreachable")),
        )]);
        let dispatcher = ToolDispatcher::new(Arc::new(table));
        let results = dispatcher
            .execute_all(&[ToolCall::new("c", "strict", Map::new())], &ToolContext::default())
            .await;
        assert_eq!(results.len(), 1);
        let reason = results[0].outcome.as_ref().unwrap_err().reason();
        assert!(reason.contains("Missing required parameters"));
        assert!(reason.contains("required_field"));
    }

    #[tokio::test]
    async fn panicking_tool_becomes_error() {
        let table = ToolTable::from_definitions(vec![sync_tool("boom", "", vec![], |_a, _c| {
            panic!("kaboom")
        })]);
        let dispatcher = ToolDispatcher::new(Arc::new(table));
        let result = dispatcher
            .execute(&ToolCall::new("c", "boom", Map::new()), &ToolContext::default())
            .await;
        assert_eq!(result.outcome, Err(ToolFailure::Message("kaboom".into())));
    }

    #[tokio::test]
    async fn results_keep_call_order_under_concurrency() {
        let table = ToolTable::from_definitions(vec![function_tool(
            "sleepy",
            "",
            vec![ToolParameter::required("ms", ParamType::Integer, "")],
            |args, _ctx| async move {
                let ms = args.get("ms").and_then(Value::as_u64).unwrap_or(0);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok::<Value, ToolFailure>(json!(ms))
            },
        )]);
        let dispatcher = ToolDispatcher::new(Arc::new(table));
        let calls = vec![
            ToolCall::new("a", "sleepy", args(json!({"ms": 30}))),
            ToolCall::new("b", "sleepy", args(json!({"ms": 1}))),
        ];
        let results = dispatcher.execute_all(&calls, &ToolContext::default()).await;
        let ids: Vec<_> = results.iter().map(|r| r.tool_call_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    struct RecordingActions;

    #[async_trait]
    impl ActionDispatcher for RecordingActions {
        async fn dispatch(
            &self,
            action: &ActionRef,
            arguments: Map<String, Value>,
            context: &ToolContext,
        ) -> Result<Value, ToolFailure> {
            Ok(json!({
                "action": action.to_string(),
                "args": arguments,
                "tenant": context.tenant,
                "actor": context.actor,
            }))
        }
    }

    #[tokio::test]
    async fn action_tools_receive_execution_context() {
        let table = ToolTable::from_definitions(vec![action_tool(
            "read_ticket",
            "",
            vec![],
            ActionRef::new("ticket", "read"),
        )]);
        let dispatcher = ToolDispatcher::new(Arc::new(table)).with_action_dispatcher(Arc::new(RecordingActions));
        let ctx = ToolContext {
            agent: "support".into(),
            domain: Some("helpdesk".into()),
            actor: Some(json!({"id": 1})),
            tenant: Some(json!("acme")),
        };
        let result = dispatcher
            .execute(&ToolCall::new("c", "read_ticket", Map::new()), &ctx)
            .await;
        let payload = result.outcome.unwrap();
        assert_eq!(payload["action"], "ticket.read");
        assert_eq!(payload["tenant"], "acme");
        assert_eq!(payload["actor"]["id"], 1);
    }

    #[tokio::test]
    async fn action_without_dispatcher_fails_softly() {
        let table = ToolTable::from_definitions(vec![action_tool(
            "read_ticket",
            "",
            vec![],
            ActionRef::new("ticket", "read"),
        )]);
        let dispatcher = ToolDispatcher::new(Arc::new(table));
        let result = dispatcher
            .execute(&ToolCall::new("c", "read_ticket", Map::new()), &ToolContext::default())
            .await;
        assert!(result.outcome.unwrap_err().reason().contains("ticket.read"));
    }

    #[tokio::test]
    async fn emits_tool_execute_events() {
        let sink = Arc::new(MemorySink::new());
        let dispatcher = ToolDispatcher::new(Arc::new(greet_table()))
            .with_concurrency(false)
            .with_telemetry(Telemetry::new(vec![sink.clone()]));
        dispatcher
            .execute(&ToolCall::new("c", "greet", args(json!({"name": "Bo"}))), &ToolContext::default())
            .await;
        let events = sink.named(names::TOOL_EXECUTE);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata_str("tool"), Some("greet"));
        assert_eq!(events[0].metadata_str("status"), Some("ok"));
    }
}
