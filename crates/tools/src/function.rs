//! Closure-backed tools.
//!
//! Most tools are a name, a parameter list and a function. These
//! helpers turn a closure into a [`ToolDefinition`] without a bespoke
//! struct per tool.

use async_trait::async_trait;
use ostinato_core::tool::{
    ActionRef, ToolContext, ToolDefinition, ToolFailure, ToolFunction, ToolHandler, ToolParameter,
};
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// Adapts an async closure to [`ToolFunction`].
pub struct FnTool<F> {
    f: F,
}

impl<F> FnTool<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> ToolFunction for FnTool<F>
where
    F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolFailure>> + Send + 'static,
{
    async fn invoke(&self, arguments: Map<String, Value>, context: &ToolContext) -> Result<Value, ToolFailure> {
        (self.f)(arguments, context.clone()).await
    }
}

/// Adapts a synchronous closure to [`ToolFunction`].
pub struct SyncFnTool<F> {
    f: F,
}

#[async_trait]
impl<F> ToolFunction for SyncFnTool<F>
where
    F: Fn(&Map<String, Value>, &ToolContext) -> Result<Value, ToolFailure> + Send + Sync + 'static,
{
    async fn invoke(&self, arguments: Map<String, Value>, context: &ToolContext) -> Result<Value, ToolFailure> {
        (self.f)(&arguments, context)
    }
}

/// A tool backed by an async closure.
pub fn function_tool<F, Fut>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: Vec<ToolParameter>,
    f: F,
) -> ToolDefinition
where
    F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ToolFailure>> + Send + 'static,
{
    ToolDefinition::new(
        name,
        description,
        parameters,
        ToolHandler::Function(Arc::new(FnTool::new(f))),
    )
}

/// A tool backed by a synchronous closure.
pub fn sync_tool<F>(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: Vec<ToolParameter>,
    f: F,
) -> ToolDefinition
where
    F: Fn(&Map<String, Value>, &ToolContext) -> Result<Value, ToolFailure> + Send + Sync + 'static,
{
    ToolDefinition::new(
        name,
        description,
        parameters,
        ToolHandler::Function(Arc::new(SyncFnTool { f })),
    )
}

/// A tool executed by the configured [`ActionDispatcher`](ostinato_core::tool::ActionDispatcher).
pub fn action_tool(
    name: impl Into<String>,
    description: impl Into<String>,
    parameters: Vec<ToolParameter>,
    action: ActionRef,
) -> ToolDefinition {
    ToolDefinition::new(name, description, parameters, ToolHandler::Action(action))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostinato_core::tool::ParamType;
    use serde_json::json;

    #[tokio::test]
    async fn async_closure_is_invoked() {
        let tool = function_tool(
            "double",
            "Doubles n",
            vec![ToolParameter::required("n", ParamType::Integer, "")],
            |args, _ctx| async move {
                match args.get("n").and_then(Value::as_i64) {
                    Some(n) => Ok(json!(n * 2)),
                    None => Err(ToolFailure::from("n must be an integer")),
                }
            },
        );
        let ToolHandler::Function(f) = &tool.handler else {
            panic!("expected function handler");
        };
        let mut args = Map::new();
        args.insert("n".into(), json!(21));
        assert_eq!(f.invoke(args, &ToolContext::default()).await, Ok(json!(42)));
    }

    #[tokio::test]
    async fn sync_closure_sees_context() {
        let tool = sync_tool("whoami", "", vec![], |_args, ctx| Ok(json!(ctx.agent)));
        let ToolHandler::Function(f) = &tool.handler else {
            panic!("expected function handler");
        };
        let ctx = ToolContext {
            agent: "support".into(),
            ..Default::default()
        };
        assert_eq!(f.invoke(Map::new(), &ctx).await, Ok(json!("support")));
    }
}
