//! Public entry points.
//!
//! An [`Agent`] is immutable configuration: client, prompt template,
//! output schema, tools and hooks. Every call builds its own context, so
//! one agent can serve concurrent calls.
//!
//! Each entry point comes in two forms. `try_call`/`try_stream` return
//! the typed [`AgentError`]; `call`/`stream` return `anyhow::Result`
//! whose error displays the same message and downcasts back to
//! [`AgentError`].

use crate::context::{Context, ContextOptions};
use crate::disclosure::{DisclosureHooks, DisclosureSettings};
use crate::hooks::{CallInfo, DefaultHooks, HookChain, HookEnv, Hooks};
use crate::loop_runner::{LoopState, ToolCallingLoop};
use crate::prompt::{PromptRenderer, RenderConfig, TemplateRenderer, variables_for};
use crate::result::AgentResult;
use crate::schema::OutputSchema;
use crate::settings::{LoopSettings, TokenLimits};
use crate::stream::AgentStream;
use ostinato_config::AppConfig;
use ostinato_core::error::{AgentError, Error, Result};
use ostinato_core::provider::{CallContext, ClientSpec, Provider, ProviderRequest, StreamChunk, chunk_stream};
use ostinato_core::tool::{ActionDispatcher, ToolContext, ToolDefinition};
use ostinato_providers::{ProviderRegistry, ProviderResolver, extract, usage_of};
use ostinato_telemetry::{Span, Telemetry, TelemetryEvent, names};
use ostinato_tools::{ToolDispatcher, ToolTable};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-call identity handed to tools.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallScope {
    /// Overrides the agent's configured domain
    pub domain: Option<String>,
    pub actor: Option<Value>,
    pub tenant: Option<Value>,
}

/// A configured agent.
#[derive(Clone)]
pub struct Agent {
    name: String,
    client: ClientSpec,
    template: Option<String>,
    schema: OutputSchema,
    options: Map<String, Value>,
    tools: Arc<ToolTable>,
    hooks: Arc<dyn Hooks>,
    resolver: ProviderResolver,
    renderer: Arc<dyn PromptRenderer>,
    actions: Option<Arc<dyn ActionDispatcher>>,
    settings: LoopSettings,
    token_limits: TokenLimits,
    telemetry: Telemetry,
    domain: Option<String>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("client", &self.client)
            .field("tools", &self.tools.names())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

/// What the shared prelude of `call` and `stream` produces.
struct Prepared {
    input: Value,
    prompt: Option<String>,
    provider: Arc<dyn Provider>,
}

/// Input and prompt as far as the call got, for `on_error`.
#[derive(Default)]
struct Trace {
    input: Value,
    prompt: Option<String>,
}

impl Agent {
    pub fn builder(name: impl Into<String>) -> AgentBuilder {
        AgentBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client(&self) -> &ClientSpec {
        &self.client
    }

    pub fn tools(&self) -> &ToolTable {
        &self.tools
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    /// Run one call and return the typed error on failure.
    pub async fn try_call(&self, input: Value) -> Result<AgentResult> {
        self.try_call_with(input, &CallScope::default()).await
    }

    pub async fn try_call_with(&self, input: Value, scope: &CallScope) -> Result<AgentResult> {
        let span = self.telemetry.start_span("call", self.span_metadata());
        let mut trace = Trace {
            input: input.clone(),
            prompt: None,
        };

        let outcome = match self.run_call(input, scope, &mut trace).await {
            Ok(result) => Ok(result),
            Err(e) => {
                warn!(agent = %self.name, error = %e, "Agent call failed");
                self.hooks.on_error(&self.call_info(&trace), e)
            }
        };

        let status = if outcome.is_ok() { "ok" } else { "error" };
        self.telemetry.stop_span(&span, status);
        self.emit_summary(names::CALL_SUMMARY, &span, status, outcome.as_ref().ok());
        outcome
    }

    /// Run one call; the error converts to `anyhow::Error` with the
    /// typed [`AgentError`] as its source.
    pub async fn call(&self, input: Value) -> anyhow::Result<AgentResult> {
        self.try_call(input).await.map_err(anyhow::Error::new)
    }

    pub async fn call_with(&self, input: Value, scope: &CallScope) -> anyhow::Result<AgentResult> {
        self.try_call_with(input, scope).await.map_err(anyhow::Error::new)
    }

    /// Start a streaming call. Streaming is only defined for agents
    /// without tools.
    pub async fn try_stream(&self, input: Value) -> Result<AgentStream> {
        let span = self.telemetry.start_span("stream", self.span_metadata());
        let mut trace = Trace {
            input: input.clone(),
            prompt: None,
        };

        match self.open_stream(input, &mut trace).await {
            Ok(rx) => Ok(AgentStream::new(
                self.name.clone(),
                rx,
                self.schema.clone(),
                self.telemetry.clone(),
                span,
            )),
            Err(e) => {
                warn!(agent = %self.name, error = %e, "Agent stream failed to start");
                match self.hooks.on_error(&self.call_info(&trace), e) {
                    Ok(recovered) => {
                        let chunk = StreamChunk {
                            content: Some(recovered.content),
                            data: Some(recovered.output),
                            done: true,
                            usage: Some(recovered.usage),
                        };
                        Ok(AgentStream::new(
                            self.name.clone(),
                            chunk_stream(vec![Ok(chunk)]),
                            OutputSchema::Json,
                            self.telemetry.clone(),
                            span,
                        ))
                    }
                    Err(e) => {
                        self.telemetry.stop_span(&span, "error");
                        self.emit_summary(names::STREAM_SUMMARY, &span, "error", None);
                        Err(e)
                    }
                }
            }
        }
    }

    pub async fn stream(&self, input: Value) -> anyhow::Result<AgentStream> {
        self.try_stream(input).await.map_err(anyhow::Error::new)
    }

    async fn run_call(&self, input: Value, scope: &CallScope, trace: &mut Trace) -> Result<AgentResult> {
        let Prepared {
            input,
            prompt,
            provider,
        } = self.prepare(input, trace)?;

        let call_context = CallContext {
            agent: self.name.clone(),
            input: input.clone(),
            rendered_prompt: prompt.clone(),
        };

        let result = if self.tools.is_empty() {
            self.simple_call(provider, call_context, &input, prompt.clone()).await?
        } else {
            self.tool_call(provider, call_context, &input, prompt.clone(), scope)
                .await?
        };

        let info = CallInfo {
            agent: &self.name,
            input: &input,
            prompt: prompt.as_deref(),
        };
        self.hooks.after_call(&info, result)
    }

    /// `before_call`, render, `after_render`, schema check, provider
    /// resolution. Shared by both entry points.
    fn prepare(&self, input: Value, trace: &mut Trace) -> Result<Prepared> {
        let input = self.hooks.before_call(&self.name, input)?;
        trace.input = input.clone();

        let prompt = match &self.template {
            Some(template) => {
                let config = RenderConfig {
                    output_format: self.schema.format_instructions(),
                };
                let rendered = self
                    .renderer
                    .render(template, &variables_for(&input), &config)
                    .map_err(Error::Prompt)?;
                Some(rendered)
            }
            None => None,
        };
        trace.prompt = prompt.clone();

        self.hooks.after_render(&CallInfo {
            agent: &self.name,
            input: &input,
            prompt: prompt.as_deref(),
        })?;
        self.schema.validate()?;
        let provider = self.resolver.resolve(&self.client)?;
        Ok(Prepared {
            input,
            prompt,
            provider,
        })
    }

    /// One provider call, no loop.
    async fn simple_call(
        &self,
        provider: Arc<dyn Provider>,
        call_context: CallContext,
        input: &Value,
        prompt: Option<String>,
    ) -> Result<AgentResult> {
        debug!(agent = %self.name, provider = provider.name(), "Simple call");
        let request = self.single_request(call_context, input, prompt);
        let response = provider.call(request).await?;

        let extracted = extract(&response.output);
        let output = self
            .schema
            .parse(&extracted.content, extracted.structured.as_ref())?;
        Ok(AgentResult {
            output,
            content: extracted.content,
            usage: usage_of(&response).unwrap_or_default(),
            iterations: 1,
            tool_calls_made: 0,
            context: None,
        })
    }

    async fn tool_call(
        &self,
        provider: Arc<dyn Provider>,
        call_context: CallContext,
        input: &Value,
        prompt: Option<String>,
        scope: &CallScope,
    ) -> Result<AgentResult> {
        if !provider.supports_tools() {
            return Err(Error::Validation(format!(
                "provider `{}` does not support tool calling",
                provider.name()
            )));
        }

        let context = Context::new(input, &ContextOptions { system_prompt: prompt });
        let mut dispatcher = ToolDispatcher::new(Arc::clone(&self.tools))
            .with_concurrency(self.settings.concurrent_tools)
            .with_telemetry(self.telemetry.clone());
        if let Some(actions) = &self.actions {
            dispatcher = dispatcher.with_action_dispatcher(Arc::clone(actions));
        }

        let state = LoopState {
            env: HookEnv {
                agent: self.name.clone(),
                client: self.client.clone(),
                max_iterations: self.settings.max_iterations,
                token_limits: self.token_limits,
                telemetry: self.telemetry.clone(),
            },
            provider,
            schema: self.schema.clone(),
            options: self.options.clone(),
            call_context,
            tools: self.tools.schemas(),
            dispatcher,
            tool_context: ToolContext {
                agent: self.name.clone(),
                domain: scope.domain.clone().or_else(|| self.domain.clone()),
                actor: scope.actor.clone(),
                tenant: scope.tenant.clone(),
            },
            hooks: Arc::clone(&self.hooks),
            settings: self.settings,
        };
        info!(agent = %self.name, tools = self.tools.len(), "Starting tool loop");
        ToolCallingLoop::new(state).run(context).await
    }

    async fn open_stream(&self, input: Value, trace: &mut Trace) -> Result<ostinato_core::ChunkReceiver> {
        if !self.tools.is_empty() {
            return Err(Error::Validation("streaming is not supported for agents with tools".into()));
        }
        let Prepared {
            input,
            prompt,
            provider,
        } = self.prepare(input, trace)?;
        let call_context = CallContext {
            agent: self.name.clone(),
            input: input.clone(),
            rendered_prompt: prompt.clone(),
        };
        if !provider.supports_streaming() {
            debug!(provider = provider.name(), "Provider does not stream, expecting a single chunk");
        }
        let request = self.single_request(call_context, &input, prompt);
        Ok(provider.stream(request).await?)
    }

    /// The request of the no-tool path: the rendered prompt if there is
    /// one, otherwise the input as a user message.
    fn single_request(&self, call_context: CallContext, input: &Value, prompt: Option<String>) -> ProviderRequest {
        let messages = match prompt {
            Some(_) => None,
            None => Some(Context::new(input, &ContextOptions::default()).to_messages()),
        };
        ProviderRequest {
            client: self.client.clone(),
            prompt,
            schema: self.schema.json_schema(),
            options: self.options.clone(),
            context: call_context,
            tools: None,
            messages,
        }
    }

    fn call_info<'a>(&'a self, trace: &'a Trace) -> CallInfo<'a> {
        CallInfo {
            agent: &self.name,
            input: &trace.input,
            prompt: trace.prompt.as_deref(),
        }
    }

    fn span_metadata(&self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert("agent".into(), Value::String(self.name.clone()));
        metadata.insert("client".into(), Value::String(self.client.to_string()));
        metadata.insert("provider".into(), Value::String(self.client.provider.clone()));
        metadata
    }

    fn emit_summary(&self, name: &str, span: &Span, status: &str, result: Option<&AgentResult>) {
        let mut event = TelemetryEvent::new(name)
            .measure("duration", span.elapsed_ms())
            .with_metadata(&span.metadata)
            .meta("status", status);
        if let Some(result) = result {
            event = event
                .measure("input_tokens", result.usage.input_tokens)
                .measure("output_tokens", result.usage.output_tokens)
                .measure("total_tokens", result.usage.total_tokens)
                .measure("iterations", result.iterations)
                .measure("tool_calls", result.tool_calls_made);
        }
        self.telemetry.emit(event);
    }
}

/// Builds an [`Agent`].
pub struct AgentBuilder {
    name: String,
    client: Option<String>,
    template: Option<String>,
    schema: OutputSchema,
    options: Map<String, Value>,
    tools: ToolTable,
    hooks: Vec<Arc<dyn Hooks>>,
    resolver: ProviderResolver,
    renderer: Arc<dyn PromptRenderer>,
    actions: Option<Arc<dyn ActionDispatcher>>,
    settings: LoopSettings,
    token_limits: TokenLimits,
    telemetry: Telemetry,
    domain: Option<String>,
}

impl AgentBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client: None,
            template: None,
            schema: OutputSchema::Text,
            options: Map::new(),
            tools: ToolTable::new(),
            hooks: Vec::new(),
            resolver: ProviderResolver::new(),
            renderer: Arc::new(TemplateRenderer),
            actions: None,
            settings: LoopSettings::default(),
            token_limits: TokenLimits::default(),
            telemetry: Telemetry::default(),
            domain: None,
        }
    }

    /// Start from loaded configuration: client, loop settings, token
    /// limits, telemetry, and disclosure hooks when any are configured.
    pub fn from_config(name: impl Into<String>, config: &AppConfig) -> Self {
        let mut builder = Self::new(name)
            .client(config.agent.client.clone())
            .settings(LoopSettings::from_config(config))
            .token_limits(TokenLimits::from_config(config))
            .telemetry(Telemetry::from_config(&config.telemetry, Vec::new()));
        let disclosure = DisclosureSettings::from_config(&config.progressive_disclosure);
        if disclosure.is_enabled() {
            builder = builder.hooks(Arc::new(DisclosureHooks::new(disclosure)));
        }
        builder
    }

    /// `provider:model` client string.
    pub fn client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    pub fn schema(mut self, schema: OutputSchema) -> Self {
        self.schema = schema;
        self
    }

    /// Provider options (temperature, max tokens, ...).
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    pub fn tool(mut self, tool: ToolDefinition) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn tools(mut self, tools: impl IntoIterator<Item = ToolDefinition>) -> Self {
        for tool in tools {
            self.tools.register(tool);
        }
        self
    }

    /// Add a hook set. Several sets run in the order added.
    pub fn hooks(mut self, hooks: Arc<dyn Hooks>) -> Self {
        self.hooks.push(hooks);
        self
    }

    /// Register a provider for this agent only; it wins over the
    /// shared registry and the built-ins.
    pub fn provider(mut self, name: impl Into<String>, provider: Arc<dyn Provider>) -> Self {
        self.resolver = self.resolver.with_provider(name, provider);
        self
    }

    /// Resolve through `registry` instead of the process-wide one.
    pub fn registry(mut self, registry: Arc<ProviderRegistry>) -> Self {
        self.resolver = self.resolver.with_registry(registry);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PromptRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn action_dispatcher(mut self, actions: Arc<dyn ActionDispatcher>) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn max_iterations(mut self, max: u32) -> Self {
        self.settings.max_iterations = max;
        self
    }

    pub fn token_limits(mut self, limits: TokenLimits) -> Self {
        self.token_limits = limits;
        self
    }

    pub fn telemetry(mut self, telemetry: Telemetry) -> Self {
        self.telemetry = telemetry;
        self
    }

    /// Domain reference passed to tools and action dispatchers.
    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn build(self) -> Result<Agent> {
        let raw = self.client.as_deref().unwrap_or("echo");
        let client = ClientSpec::parse(raw)
            .ok_or_else(|| Error::Config(format!("invalid client `{raw}`, expected `provider:model`")))?;
        if self.name.trim().is_empty() {
            return Err(Error::Config("agent name must not be empty".into()));
        }
        if self.settings.max_iterations == 0 {
            return Err(Error::Config("max_iterations must be at least 1".into()));
        }

        let hooks: Arc<dyn Hooks> = match self.hooks.len() {
            0 => Arc::new(DefaultHooks),
            1 => Arc::clone(&self.hooks[0]),
            _ => Arc::new(
                self.hooks
                    .into_iter()
                    .fold(HookChain::new(), |chain, hooks| chain.with(hooks)),
            ),
        };

        Ok(Agent {
            name: self.name,
            client,
            template: self.template,
            schema: self.schema,
            options: self.options,
            tools: Arc::new(self.tools),
            hooks,
            resolver: self.resolver,
            renderer: self.renderer,
            actions: self.actions,
            settings: self.settings,
            token_limits: self.token_limits,
            telemetry: self.telemetry,
            domain: self.domain,
        })
    }
}

/// Downcast an `anyhow` error from `call`/`stream` back to the typed error.
pub fn agent_error(error: &anyhow::Error) -> Option<&AgentError> {
    error.downcast_ref::<AgentError>()
}
