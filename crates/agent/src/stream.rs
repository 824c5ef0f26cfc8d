//! Streaming agent output.
//!
//! [`AgentStream`] converts each provider chunk into the agent's output
//! type on its own. A chunk that does not convert is still yielded, as
//! [`StreamItem::Unparsed`], so a consumer never loses data.

use crate::schema::OutputSchema;
use futures::Stream;
use ostinato_core::error::{Error, Result};
use ostinato_core::provider::{ChunkReceiver, StreamChunk};
use ostinato_core::usage::TokenUsage;
use ostinato_telemetry::{Span, Telemetry, TelemetryEvent, names};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use tracing::debug;

/// One converted chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamItem {
    /// The chunk converted to the output type.
    Parsed { index: usize, value: Value },
    /// The chunk as received; conversion failed.
    Unparsed { index: usize, raw: Value },
}

impl StreamItem {
    pub fn index(&self) -> usize {
        match self {
            Self::Parsed { index, .. } | Self::Unparsed { index, .. } => *index,
        }
    }

    /// The converted value, or the raw chunk when conversion failed.
    pub fn value(&self) -> &Value {
        match self {
            Self::Parsed { value, .. } => value,
            Self::Unparsed { raw, .. } => raw,
        }
    }

    pub fn is_parsed(&self) -> bool {
        matches!(self, Self::Parsed { .. })
    }
}

/// A stream of converted chunks.
///
/// Emits `stream.chunk` per chunk and, once the provider stream ends,
/// `stream.stop` plus a `stream.summary` carrying the last chunk.
/// Dropping the stream early stops the span with status `cancelled`.
pub struct AgentStream {
    agent: String,
    rx: ChunkReceiver,
    schema: OutputSchema,
    telemetry: Telemetry,
    span: Option<Span>,
    index: usize,
    last: Option<Value>,
    usage: TokenUsage,
}

impl AgentStream {
    pub fn new(agent: impl Into<String>, rx: ChunkReceiver, schema: OutputSchema, telemetry: Telemetry, span: Span) -> Self {
        Self {
            agent: agent.into(),
            rx,
            schema,
            telemetry,
            span: Some(span),
            index: 0,
            last: None,
            usage: TokenUsage::default(),
        }
    }

    /// Usage reported by the chunks seen so far.
    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    fn convert(&mut self, chunk: StreamChunk) -> StreamItem {
        let index = self.index;
        self.index += 1;
        if let Some(usage) = chunk.usage {
            self.usage += usage;
        }

        self.telemetry.emit(
            TelemetryEvent::new(names::STREAM_CHUNK)
                .measure("index", index)
                .meta("agent", self.agent.as_str())
                .meta("chunk", chunk.raw()),
        );

        let item = match self.schema.parse_chunk(&chunk) {
            Ok(value) => StreamItem::Parsed { index, value },
            Err(e) => {
                debug!(agent = %self.agent, index, error = %e, "Chunk did not convert, passing it through");
                StreamItem::Unparsed { index, raw: chunk.raw() }
            }
        };
        self.last = Some(item.value().clone());
        item
    }

    fn finish(&mut self, status: &str) {
        let Some(span) = self.span.take() else {
            return;
        };
        self.telemetry.stop_span(&span, status);
        self.telemetry.emit(
            TelemetryEvent::new(names::STREAM_SUMMARY)
                .measure("duration", span.elapsed_ms())
                .measure("count", self.index)
                .measure("input_tokens", self.usage.input_tokens)
                .measure("output_tokens", self.usage.output_tokens)
                .measure("total_tokens", self.usage.total_tokens)
                .with_metadata(&span.metadata)
                .meta("status", status)
                .meta("result", self.last.clone().unwrap_or(Value::Null)),
        );
    }
}

impl Stream for AgentStream {
    type Item = Result<StreamItem>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.span.is_none() {
            return Poll::Ready(None);
        }
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(this.convert(chunk)))),
            Poll::Ready(Some(Err(e))) => {
                this.finish("error");
                Poll::Ready(Some(Err(Error::from(e))))
            }
            Poll::Ready(None) => {
                this.finish("ok");
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for AgentStream {
    fn drop(&mut self) {
        self.finish("cancelled");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSpec;
    use futures::StreamExt;
    use ostinato_core::ProviderError;
    use ostinato_core::provider::chunk_stream;
    use ostinato_core::tool::ParamType;
    use ostinato_telemetry::MemorySink;
    use serde_json::{Map, json};
    use std::sync::Arc;

    fn text(s: &str) -> StreamChunk {
        StreamChunk {
            content: Some(s.into()),
            ..StreamChunk::default()
        }
    }

    fn stream(chunks: Vec<std::result::Result<StreamChunk, ProviderError>>, schema: OutputSchema, sink: Arc<MemorySink>) -> AgentStream {
        let telemetry = Telemetry::new(vec![sink]);
        let span = telemetry.start_span("stream", Map::new());
        AgentStream::new("writer", chunk_stream(chunks), schema, telemetry, span)
    }

    #[tokio::test]
    async fn unconvertible_chunks_pass_through() {
        let sink = Arc::new(MemorySink::new());
        let schema = OutputSchema::object(vec![FieldSpec::required("n", ParamType::Integer)]);
        let items: Vec<_> = stream(vec![Ok(text("{\"n\": 1}")), Ok(text("{\"n\":"))], schema, sink.clone())
            .collect()
            .await;

        let items: Vec<StreamItem> = items.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(items[0], StreamItem::Parsed { index: 0, value: json!({"n": 1}) });
        assert_eq!(items[1], StreamItem::Unparsed { index: 1, raw: json!("{\"n\":") });

        assert_eq!(sink.named(names::STREAM_CHUNK).len(), 2);
        assert_eq!(sink.named(names::STREAM_STOP).len(), 1);
        let summary = sink.named(names::STREAM_SUMMARY);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].metadata.get("result"), Some(&json!("{\"n\":")));
        assert_eq!(summary[0].metadata_str("status"), Some("ok"));
    }

    #[tokio::test]
    async fn provider_error_ends_the_stream() {
        let sink = Arc::new(MemorySink::new());
        let mut s = stream(
            vec![Ok(text("a")), Err(ProviderError::StreamInterrupted("reset".into())), Ok(text("b"))],
            OutputSchema::Text,
            sink.clone(),
        );
        assert!(s.next().await.unwrap().is_ok());
        assert!(s.next().await.unwrap().is_err());
        assert!(s.next().await.is_none());
        let stops = sink.named(names::STREAM_STOP);
        assert_eq!(stops.len(), 1);
        assert_eq!(stops[0].metadata_str("status"), Some("error"));
    }

    #[tokio::test]
    async fn dropped_stream_reports_cancelled() {
        let sink = Arc::new(MemorySink::new());
        let mut s = stream(vec![Ok(text("a")), Ok(text("b"))], OutputSchema::Text, sink.clone());
        let first = s.next().await.unwrap().unwrap();
        assert_eq!(first.value(), &json!("a"));
        drop(s);
        let stops = sink.named(names::STREAM_STOP);
        assert_eq!(stops[0].metadata_str("status"), Some("cancelled"));
    }
}
