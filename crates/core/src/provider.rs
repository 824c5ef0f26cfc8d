//! Provider trait — the abstraction over LLM backends.
//!
//! A Provider knows how to send a request to a language model and get a
//! response back, either whole or as a stream of chunks. Concrete vendor
//! implementations live outside this workspace; the loop only sees this
//! trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProviderError;
use crate::message::WireMessage;
use crate::tool::ToolCall;
use crate::usage::TokenUsage;

/// A `provider:model` client string, e.g. `anthropic:claude-sonnet-4`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientSpec {
    pub provider: String,
    pub model: String,
}

impl ClientSpec {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
        }
    }

    /// Parse `provider:model`. A bare name is a provider with an empty model.
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return None;
        }
        match spec.split_once(':') {
            Some((provider, _)) if provider.is_empty() => None,
            Some((provider, model)) => Some(Self::new(provider, model)),
            None => Some(Self::new(spec, "")),
        }
    }
}

impl std::fmt::Display for ClientSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.model.is_empty() {
            write!(f, "{}", self.provider)
        } else {
            write!(f, "{}:{}", self.provider, self.model)
        }
    }
}

/// What the provider is told about the call it serves.
///
/// Specialized providers may skip the prompt entirely and work from
/// `input`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallContext {
    pub agent: String,
    pub input: Value,
    pub rendered_prompt: Option<String>,
}

/// A tool definition sent to the LLM so it knows what tools it can call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON Schema describing the tool's parameters
    pub parameters: Value,
}

/// A provider request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    pub client: ClientSpec,

    /// Rendered prompt; `None` once messages take over
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    /// JSON schema of the expected output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,

    /// Client options (temperature, max tokens, ...)
    #[serde(default)]
    pub options: Map<String, Value>,

    pub context: CallContext,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<WireMessage>>,
}

/// A distinguished, tagged response variant.
///
/// Some provider families return tool calls as their own object type,
/// spelling the fields `tool_name`/`tool_arguments` or `name`/`arguments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaggedPart {
    Text {
        text: String,
    },
    ToolCall {
        #[serde(default)]
        id: Option<String>,
        #[serde(alias = "name")]
        tool_name: String,
        #[serde(default, alias = "arguments")]
        tool_arguments: Value,
    },
}

/// The body of a provider response, in whichever shape the provider produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResponseOutput {
    /// Already-normalized text plus tool calls.
    Message {
        #[serde(default)]
        content: Option<String>,
        #[serde(default)]
        tool_calls: Vec<ToolCall>,
    },
    /// Tagged variants.
    Tagged { parts: Vec<TaggedPart> },
    /// A raw vendor JSON body or a structured final value.
    Json { body: Value },
}

/// A complete (non-streaming) response from a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub output: ResponseOutput,

    /// Token usage statistics
    #[serde(default)]
    pub usage: Option<TokenUsage>,

    /// Which model actually responded
    #[serde(default)]
    pub model: Option<String>,
}

impl ProviderResponse {
    /// A plain text answer.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            output: ResponseOutput::Message {
                content: Some(content.into()),
                tool_calls: Vec::new(),
            },
            usage: None,
            model: None,
        }
    }

    /// An answer requesting tool calls.
    pub fn tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            output: ResponseOutput::Message {
                content: Some(content.into()),
                tool_calls,
            },
            usage: None,
            model: None,
        }
    }

    /// A raw JSON body.
    pub fn json(body: Value) -> Self {
        Self {
            output: ResponseOutput::Json { body },
            usage: None,
            model: None,
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Collapse the whole response into one final stream chunk.
    pub fn into_chunk(self) -> StreamChunk {
        let (content, data) = match self.output {
            ResponseOutput::Message { content, .. } => (content, None),
            ResponseOutput::Tagged { parts } => {
                let text: Vec<String> = parts
                    .into_iter()
                    .filter_map(|p| match p {
                        TaggedPart::Text { text } => Some(text),
                        TaggedPart::ToolCall { .. } => None,
                    })
                    .collect();
                (Some(text.join("")), None)
            }
            ResponseOutput::Json { body } => (None, Some(body)),
        };
        StreamChunk {
            content,
            data,
            done: true,
            usage: self.usage,
        }
    }
}

/// A single chunk in a streaming response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Partial content
    #[serde(default)]
    pub content: Option<String>,

    /// Structured partial value, for providers that stream objects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,

    /// Usage info (typically only in the final chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

impl StreamChunk {
    /// The chunk as a JSON value: structured data if present, otherwise text.
    pub fn raw(&self) -> Value {
        match (&self.data, &self.content) {
            (Some(data), _) => data.clone(),
            (None, Some(text)) => Value::String(text.clone()),
            (None, None) => Value::Null,
        }
    }
}

/// Receiving half of a chunk stream.
pub type ChunkReceiver = tokio::sync::mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>;

/// The core Provider trait.
///
/// The agent loop calls `call()` or `stream()` without knowing which
/// backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g. "anthropic").
    fn name(&self) -> &str;

    /// Whether the provider accepts tool schemas.
    fn supports_tools(&self) -> bool {
        true
    }

    /// Whether `stream()` produces real incremental chunks.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Send a request and get a complete response.
    ///
    /// Timeouts are the provider's job; a call that runs too long must
    /// come back as [`ProviderError::Timeout`].
    async fn call(&self, request: ProviderRequest) -> std::result::Result<ProviderResponse, ProviderError>;

    /// Send a request and get a stream of response chunks.
    ///
    /// Default implementation calls `call()` and wraps the result as a single chunk.
    async fn stream(&self, request: ProviderRequest) -> std::result::Result<ChunkReceiver, ProviderError> {
        let response = self.call(request).await?;
        Ok(chunk_stream(vec![Ok(response.into_chunk())]))
    }
}

/// Build a receiver pre-loaded with the given chunks.
pub fn chunk_stream(chunks: Vec<std::result::Result<StreamChunk, ProviderError>>) -> ChunkReceiver {
    let (tx, rx) = tokio::sync::mpsc::channel(chunks.len().max(1));
    for chunk in chunks {
        // Capacity covers every chunk
        let _ = tx.try_send(chunk);
    }
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct FixedProvider;

    #[async_trait]
    impl Provider for FixedProvider {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn call(&self, _request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            Ok(ProviderResponse::text("hello").with_usage(TokenUsage::new(3, 2)))
        }
    }

    fn request() -> ProviderRequest {
        ProviderRequest {
            client: ClientSpec::new("fixed", "m"),
            prompt: Some("hi".into()),
            schema: None,
            options: Map::new(),
            context: CallContext::default(),
            tools: None,
            messages: None,
        }
    }

    #[test]
    fn client_spec_parsing() {
        let spec = ClientSpec::parse("anthropic:claude-sonnet-4").unwrap();
        assert_eq!(spec.provider, "anthropic");
        assert_eq!(spec.model, "claude-sonnet-4");
        assert_eq!(spec.to_string(), "anthropic:claude-sonnet-4");

        assert_eq!(ClientSpec::parse("echo").unwrap().model, "");
        assert!(ClientSpec::parse("").is_none());
        assert!(ClientSpec::parse(":model").is_none());
    }

    #[test]
    fn tagged_part_accepts_both_spellings() {
        let a: TaggedPart =
            serde_json::from_value(json!({"type": "tool_call", "tool_name": "x", "tool_arguments": {}}))
                .unwrap();
        let b: TaggedPart =
            serde_json::from_value(json!({"type": "tool_call", "name": "x", "arguments": {}})).unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn default_stream_wraps_single_chunk() {
        let mut rx = FixedProvider.stream(request()).await.unwrap();
        let chunk = rx.recv().await.unwrap().unwrap();
        assert_eq!(chunk.content.as_deref(), Some("hello"));
        assert!(chunk.done);
        assert_eq!(chunk.usage, Some(TokenUsage::new(3, 2)));
        assert!(rx.recv().await.is_none());
    }
}
