//! The tool-calling loop.
//!
//! One iteration: check whether to continue, let hooks shape the context
//! and messages, call the provider, then either finish with the parsed
//! answer or dispatch the requested tools and fold their results back
//! into the context.

use crate::context::Context;
use crate::hooks::{
    ContextInput, HookEnv, Hooks, IterationComplete, IterationStart, MessagesInput,
    ToolResultsInput,
};
use crate::result::AgentResult;
use crate::schema::OutputSchema;
use crate::settings::{LoopSettings, ToolErrorPolicy};
use ostinato_core::error::{Error, LlmError, Result};
use ostinato_core::provider::{CallContext, Provider, ProviderRequest, ToolSchema};
use ostinato_core::tool::{ToolCall, ToolContext, ToolResult};
use ostinato_providers::{extract, usage_of};
use ostinato_telemetry::{TelemetryEvent, names};
use ostinato_tools::ToolDispatcher;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Everything one call's loop needs, assembled once per call.
pub struct LoopState {
    pub env: HookEnv,
    pub provider: Arc<dyn Provider>,
    pub schema: OutputSchema,
    pub options: Map<String, Value>,
    /// Passed through to the provider on every request
    pub call_context: CallContext,
    /// The tool table in provider schema form
    pub tools: Vec<ToolSchema>,
    pub dispatcher: ToolDispatcher,
    pub tool_context: ToolContext,
    pub hooks: Arc<dyn Hooks>,
    pub settings: LoopSettings,
}

/// Drives provider calls and tool dispatch until the model answers
/// without requesting tools, or something stops the loop.
pub struct ToolCallingLoop {
    state: LoopState,
}

impl ToolCallingLoop {
    pub fn new(state: LoopState) -> Self {
        Self { state }
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Run the loop from a freshly built context.
    pub async fn run(&self, context: Context) -> Result<AgentResult> {
        let state = &self.state;
        let env = &state.env;
        let mut context = context;
        let mut tool_calls_made = 0;

        loop {
            let iteration = context.current_iteration;
            state.hooks.on_iteration_start(&IterationStart {
                env,
                iteration,
                context: &context,
            })?;
            debug!(agent = %env.agent, iteration, "Agent loop iteration");

            let cumulative = context.cumulative_tokens();
            let prepared = state.hooks.prepare_context(&ContextInput {
                env,
                context: &context,
                usage: cumulative,
                iteration,
            });
            if let Some(next) = self.best_effort("prepare_context", iteration, prepared) {
                context = next;
            }

            let messages = context.to_messages();
            let prepared = state.hooks.prepare_messages(&MessagesInput {
                env,
                messages: &messages,
                context: &context,
                tools: &state.tools,
                iteration,
            });
            let messages = self
                .best_effort("prepare_messages", iteration, prepared)
                .unwrap_or(messages);

            let request = ProviderRequest {
                client: env.client.clone(),
                prompt: None,
                schema: state.schema.json_schema(),
                options: state.options.clone(),
                context: state.call_context.clone(),
                tools: Some(state.tools.clone()),
                messages: Some(messages),
            };

            let response = match state.provider.call(request).await {
                Ok(response) => response,
                Err(e) if state.settings.tool_error_policy == ToolErrorPolicy::Continue => {
                    warn!(
                        agent = %env.agent,
                        iteration,
                        error = %e,
                        "Provider call failed, continuing with an empty turn"
                    );
                    context = context.add_assistant_message("", Vec::new()).begin_iteration();
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let extracted = extract(&response.output);
            context = context.add_assistant_message(extracted.content.clone(), extracted.tool_calls.clone());
            let usage = usage_of(&response).unwrap_or_default();
            context = context.add_token_usage(usage);

            if !extracted.has_tool_calls() {
                let output = state
                    .schema
                    .parse(&extracted.content, extracted.structured.as_ref())?;
                info!(
                    agent = %env.agent,
                    iterations = iteration,
                    tool_calls = tool_calls_made,
                    "Agent produced final answer"
                );
                return Ok(AgentResult {
                    output,
                    content: extracted.content,
                    usage: context.cumulative_tokens(),
                    iterations: iteration,
                    tool_calls_made,
                    context: Some(context),
                });
            }

            let calls = extracted.tool_calls;
            debug!(agent = %env.agent, iteration, tool_count = calls.len(), "Executing tool calls");
            let results = state.dispatcher.execute_all(&calls, &state.tool_context).await;
            tool_calls_made += calls.len();

            let prepared = state.hooks.prepare_tool_results(&ToolResultsInput {
                env,
                tool_calls: &calls,
                results: &results,
                context: &context,
                usage: context.cumulative_tokens(),
            });
            let results = self
                .best_effort("prepare_tool_results", iteration, prepared)
                .unwrap_or(results);

            if state.settings.tool_error_policy == ToolErrorPolicy::Halt {
                if let Some(error) = first_failure(&calls, &results) {
                    warn!(agent = %env.agent, iteration, error = %error, "Tool failed, halting");
                    return Err(error);
                }
            }

            context = context.add_tool_results(&results);
            let completed = state.hooks.on_iteration_complete(&IterationComplete {
                env,
                iteration,
                context: &context,
                results: &results,
                usage,
            });
            if let Err(e) = completed {
                self.report_hook_error("on_iteration_complete", iteration, &e);
            }
            context = context.begin_iteration();
        }
    }

    /// Unwrap a best-effort hook outcome. Failures are reported and
    /// read as "no change".
    fn best_effort<T>(&self, hook: &'static str, iteration: u32, outcome: Result<Option<T>>) -> Option<T> {
        match outcome {
            Ok(replacement) => replacement,
            Err(e) => {
                self.report_hook_error(hook, iteration, &e);
                None
            }
        }
    }

    fn report_hook_error(&self, hook: &'static str, iteration: u32, error: &Error) {
        let env = &self.state.env;
        warn!(
            agent = %env.agent,
            hook,
            iteration,
            error = %error,
            "Hook failed, continuing with original data"
        );
        env.telemetry.emit(
            TelemetryEvent::new(names::HOOK_ERROR)
                .meta("agent", env.agent.as_str())
                .meta("hook", hook)
                .meta("iteration", iteration)
                .meta("error", error.message()),
        );
    }
}

fn first_failure(calls: &[ToolCall], results: &[ToolResult]) -> Option<Error> {
    results.iter().find_map(|result| {
        let failure = result.outcome.as_ref().err()?;
        let tool_name = calls
            .iter()
            .find(|call| call.id == result.tool_call_id)
            .map(|call| call.name.clone())
            .unwrap_or_default();
        Some(Error::Llm(LlmError::ToolFailed {
            tool_call_id: result.tool_call_id.clone(),
            tool_name,
            reason: failure.reason(),
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ContextOptions;
    use crate::hooks::DefaultHooks;
    use crate::settings::TokenLimits;
    use ostinato_core::error::ErrorKind;
    use ostinato_core::provider::{ClientSpec, ProviderResponse};
    use ostinato_core::tool::{ParamType, ToolParameter};
    use ostinato_providers::{ScriptedProvider, make_tool_call, text_response, tool_call_response};
    use ostinato_telemetry::{MemorySink, Telemetry};
    use ostinato_tools::{ToolTable, sync_tool};
    use serde_json::json;

    fn table() -> Arc<ToolTable> {
        Arc::new(ToolTable::from_definitions([sync_tool(
            "greet",
            "Greets someone",
            vec![ToolParameter::required("name", ParamType::String, "Who")],
            |args, _ctx| {
                let name = args.get("name").and_then(Value::as_str).unwrap_or_default();
                Ok(json!({ "greeting": format!("Hello, {name}") }))
            },
        )]))
    }

    fn state(provider: Arc<dyn Provider>, hooks: Arc<dyn Hooks>, telemetry: Telemetry) -> LoopState {
        let table = table();
        LoopState {
            env: HookEnv {
                agent: "greeter".into(),
                client: ClientSpec::new("scripted", "m"),
                max_iterations: 4,
                token_limits: TokenLimits::default(),
                telemetry: telemetry.clone(),
            },
            provider,
            schema: OutputSchema::Text,
            options: Map::new(),
            call_context: CallContext::default(),
            tools: table.schemas(),
            dispatcher: ToolDispatcher::new(table),
            tool_context: ToolContext::default(),
            hooks,
            settings: LoopSettings {
                max_iterations: 4,
                ..LoopSettings::default()
            },
        }
    }

    fn start() -> Context {
        Context::new(&json!("Say hi to Alice"), &ContextOptions::default())
    }

    #[tokio::test]
    async fn tool_round_then_answer() {
        let provider = Arc::new(ScriptedProvider::tool_then_answer(
            vec![make_tool_call("greet", json!({"name": "Alice"}))],
            "Let me greet",
            "Done: Hello, Alice",
        ));
        let runner = ToolCallingLoop::new(state(provider.clone(), Arc::new(DefaultHooks), Telemetry::disabled()));
        let result = runner.run(start()).await.unwrap();

        assert_eq!(result.output, json!("Done: Hello, Alice"));
        assert_eq!(result.iterations, 2);
        assert_eq!(result.tool_calls_made, 1);
        assert_eq!(result.usage.total_tokens, 30);

        let requests = provider.requests();
        assert!(requests.iter().all(|r| r.prompt.is_none()));
        let second = requests[1].messages.as_ref().unwrap();
        assert_eq!(second.len(), 3);
        assert!(requests[1].tools.as_ref().unwrap().iter().any(|t| t.name == "greet"));
    }

    #[tokio::test]
    async fn endless_tool_calls_stop_at_max() {
        let provider = Arc::new(ScriptedProvider::repeating(tool_call_response(
            vec![make_tool_call("greet", json!({"name": "Bob"}))],
            "",
        )));
        let runner = ToolCallingLoop::new(state(provider.clone(), Arc::new(DefaultHooks), Telemetry::disabled()));
        let err = runner.run(start()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Llm(LlmError::MaxIterationsExceeded { max: 4, current: 5 })
        ));
        assert_eq!(provider.call_count(), 4);
    }

    struct BrokenPrepare;

    impl Hooks for BrokenPrepare {
        fn prepare_messages(&self, _input: &MessagesInput<'_>) -> Result<Option<Vec<ostinato_core::WireMessage>>> {
            Err(Error::hook("prepare_messages", "boom"))
        }
    }

    #[tokio::test]
    async fn failing_prepare_hook_falls_back() {
        let sink = Arc::new(MemorySink::new());
        let provider = Arc::new(ScriptedProvider::single_text("fine"));
        let runner = ToolCallingLoop::new(state(
            provider.clone(),
            Arc::new(BrokenPrepare),
            Telemetry::new(vec![sink.clone()]),
        ));
        let result = runner.run(start()).await.unwrap();
        assert_eq!(result.content, "fine");
        assert_eq!(provider.requests()[0].messages.as_ref().unwrap().len(), 1);

        let events = sink.named(names::HOOK_ERROR);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].metadata_str("hook"), Some("prepare_messages"));
    }

    #[tokio::test]
    async fn halt_policy_surfaces_tool_failure() {
        let provider = Arc::new(ScriptedProvider::tool_then_answer(
            vec![make_tool_call("missing_tool", json!({}))],
            "",
            "never",
        ));
        let mut state = state(provider, Arc::new(DefaultHooks), Telemetry::disabled());
        state.settings.tool_error_policy = ToolErrorPolicy::Halt;
        let err = ToolCallingLoop::new(state).run(start()).await.unwrap_err();
        match err {
            Error::Llm(LlmError::ToolFailed { tool_name, reason, .. }) => {
                assert_eq!(tool_name, "missing_tool");
                assert!(reason.contains("not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn provider_error_continues_under_continue_policy() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![])
                .then_error(ostinato_core::ProviderError::Timeout("slow".into()))
                .then(text_response("recovered")),
        );
        let runner = ToolCallingLoop::new(state(provider.clone(), Arc::new(DefaultHooks), Telemetry::disabled()));
        let result = runner.run(start()).await.unwrap();
        assert_eq!(result.output, json!("recovered"));
        assert_eq!(result.iterations, 2);
        let ctx = result.context.unwrap();
        assert_eq!(ctx.iterations[0].messages.len(), 2);
    }

    #[tokio::test]
    async fn provider_error_propagates_under_halt_policy() {
        let provider = Arc::new(
            ScriptedProvider::new(vec![]).then_error(ostinato_core::ProviderError::Network("down".into())),
        );
        let mut state = state(provider, Arc::new(DefaultHooks), Telemetry::disabled());
        state.settings.tool_error_policy = ToolErrorPolicy::Halt;
        let err = ToolCallingLoop::new(state).run(start()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Llm);
    }

    #[tokio::test]
    async fn structured_final_answer_is_parsed() {
        let provider = Arc::new(ScriptedProvider::new(vec![ProviderResponse::json(
            json!({"answer": "42"}),
        )]));
        let mut state = state(provider, Arc::new(DefaultHooks), Telemetry::disabled());
        state.schema = OutputSchema::object(vec![crate::schema::FieldSpec::required(
            "answer",
            ParamType::Integer,
        )]);
        let result = ToolCallingLoop::new(state).run(start()).await.unwrap();
        assert_eq!(result.output, json!({"answer": 42}));
    }
}
