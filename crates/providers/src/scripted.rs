//! In-process providers: a scripted one for tests and demos, and the
//! built-in `echo` provider.

use async_trait::async_trait;
use ostinato_core::error::ProviderError;
use ostinato_core::message::Role;
use ostinato_core::provider::{
    ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, chunk_stream,
};
use ostinato_core::tool::ToolCall;
use ostinato_core::usage::TokenUsage;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

type Scripted<T> = Mutex<VecDeque<T>>;

/// A provider that replays a queue of scripted responses.
///
/// Each `call` pops the next response. Every request is recorded so
/// tests can inspect what the loop sent. Running out of responses is a
/// [`ProviderError::NotConfigured`] rather than a panic, so a runaway
/// loop shows up as an ordinary error.
pub struct ScriptedProvider {
    name: String,
    responses: Scripted<Result<ProviderResponse, ProviderError>>,
    streams: Scripted<Vec<Result<StreamChunk, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    repeat_last: Option<ProviderResponse>,
    tools: bool,
    streaming: bool,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            name: "scripted".into(),
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            streams: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            repeat_last: None,
            tools: true,
            streaming: false,
        }
    }

    /// A provider that answers every call with the same response.
    pub fn repeating(response: ProviderResponse) -> Self {
        let mut provider = Self::new(Vec::new());
        provider.repeat_last = Some(response);
        provider
    }

    /// A provider with a single plain-text answer.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![text_response(text)])
    }

    /// A provider that first requests tools, then answers.
    pub fn tool_then_answer(tool_calls: Vec<ToolCall>, thought: &str, answer: &str) -> Self {
        Self::new(vec![tool_call_response(tool_calls, thought), text_response(answer)])
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Queue an error as the next scripted outcome.
    pub fn then_error(self, error: ProviderError) -> Self {
        self.lock_responses().push_back(Err(error));
        self
    }

    /// Queue a response after the existing script.
    pub fn then(self, response: ProviderResponse) -> Self {
        self.lock_responses().push_back(Ok(response));
        self
    }

    /// Script a chunk sequence for the next `stream` call. Marks the
    /// provider as streaming-capable.
    pub fn with_stream(mut self, chunks: Vec<Result<StreamChunk, ProviderError>>) -> Self {
        self.streaming = true;
        self.streams
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(chunks);
        self
    }

    /// Advertise no tool support.
    pub fn without_tools(mut self) -> Self {
        self.tools = false;
        self
    }

    /// Number of calls made so far (streams included).
    pub fn call_count(&self) -> usize {
        self.requests().len()
    }

    /// Every request received, oldest first.
    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn lock_responses(&self) -> std::sync::MutexGuard<'_, VecDeque<Result<ProviderResponse, ProviderError>>> {
        self.responses.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, request: ProviderRequest) -> usize {
        let mut requests = self.requests.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        requests.push(request);
        requests.len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_tools(&self) -> bool {
        self.tools
    }

    fn supports_streaming(&self) -> bool {
        self.streaming
    }

    async fn call(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.record(request);
        debug!(provider = %self.name, call = n, "Scripted call");
        match self.lock_responses().pop_front() {
            Some(outcome) => outcome,
            None => match &self.repeat_last {
                Some(response) => Ok(response.clone()),
                None => Err(ProviderError::NotConfigured(format!(
                    "{}: no more responses (call #{n})",
                    self.name
                ))),
            },
        }
    }

    async fn stream(&self, request: ProviderRequest) -> Result<ChunkReceiver, ProviderError> {
        let scripted = self
            .streams
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        match scripted {
            Some(chunks) => {
                self.record(request);
                Ok(chunk_stream(chunks))
            }
            None => {
                let response = self.call(request).await?;
                Ok(chunk_stream(vec![Ok(response.into_chunk())]))
            }
        }
    }
}

/// The built-in `echo` provider.
///
/// Answers with the last user message (or the rendered prompt when
/// there are no messages). Never requests tools.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoProvider;

impl EchoProvider {
    fn reply(request: &ProviderRequest) -> String {
        let last_user = request.messages.as_ref().and_then(|messages| {
            messages
                .iter()
                .rev()
                .find(|m| m.role == Role::User)
                .map(|m| m.content.as_text())
        });
        last_user
            .or_else(|| request.prompt.clone())
            .or_else(|| request.context.rendered_prompt.clone())
            .unwrap_or_else(|| match &request.context.input {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
    }
}

#[async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn call(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let text = Self::reply(&request);
        let usage = TokenUsage::new((text.len() as u64).div_ceil(4), (text.len() as u64).div_ceil(4));
        Ok(ProviderResponse::text(text)
            .with_usage(usage)
            .with_model(request.client.model.clone()))
    }
}

/// A plain-text response with fixed usage (10 in, 5 out).
pub fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse::text(text)
        .with_usage(TokenUsage::new(10, 5))
        .with_model("scripted-model")
}

/// A tool-requesting response with fixed usage (10 in, 5 out).
pub fn tool_call_response(tool_calls: Vec<ToolCall>, thought: &str) -> ProviderResponse {
    ProviderResponse::tool_calls(thought, tool_calls)
        .with_usage(TokenUsage::new(10, 5))
        .with_model("scripted-model")
}

/// A tool call with id `call_<name>`.
pub fn make_tool_call(name: &str, arguments: Value) -> ToolCall {
    let arguments = match arguments {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    ToolCall::new(format!("call_{name}"), name, arguments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostinato_core::message::{Message, WireMessage};
    use ostinato_core::provider::{CallContext, ClientSpec};
    use serde_json::json;

    fn request() -> ProviderRequest {
        ProviderRequest {
            client: ClientSpec::new("scripted", "m"),
            prompt: None,
            schema: None,
            options: Map::new(),
            context: CallContext::default(),
            tools: None,
            messages: None,
        }
    }

    #[tokio::test]
    async fn replays_in_order_then_errors() {
        let provider = ScriptedProvider::new(vec![text_response("one"), text_response("two")]);
        assert_eq!(provider.call(request()).await.unwrap(), text_response("one"));
        assert_eq!(provider.call(request()).await.unwrap(), text_response("two"));
        let err = provider.call(request()).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));
        assert_eq!(provider.call_count(), 3);
    }

    #[tokio::test]
    async fn scripted_errors_surface() {
        let provider = ScriptedProvider::new(vec![])
            .then_error(ProviderError::Timeout("slow".into()))
            .then(text_response("ok"));
        assert!(matches!(
            provider.call(request()).await,
            Err(ProviderError::Timeout(_))
        ));
        assert!(provider.call(request()).await.is_ok());
    }

    #[tokio::test]
    async fn repeating_never_runs_out() {
        let provider = ScriptedProvider::repeating(text_response("again"));
        for _ in 0..5 {
            assert!(provider.call(request()).await.is_ok());
        }
    }

    #[tokio::test]
    async fn scripted_stream_delivers_chunks() {
        let provider = ScriptedProvider::new(vec![]).with_stream(vec![
            Ok(StreamChunk {
                content: Some("Hel".into()),
                ..Default::default()
            }),
            Ok(StreamChunk {
                content: Some("lo".into()),
                done: true,
                ..Default::default()
            }),
        ]);
        assert!(provider.supports_streaming());
        let mut rx = provider.stream(request()).await.unwrap();
        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            text.push_str(chunk.unwrap().content.as_deref().unwrap_or_default());
        }
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn echo_repeats_last_user_message() {
        let mut req = request();
        req.messages = Some(vec![
            WireMessage::from(&Message::system("be brief")),
            WireMessage::from(&Message::user("ping")),
        ]);
        let response = EchoProvider.call(req).await.unwrap();
        assert_eq!(response, ProviderResponse::text("ping").with_usage(TokenUsage::new(1, 1)).with_model("m"));
    }

    #[test]
    fn tool_call_helper() {
        let call = make_tool_call("greet", json!({"name": "Alice"}));
        assert_eq!(call.id, "call_greet");
        assert_eq!(call.arguments["name"], "Alice");
    }
}
