//! Data model for telemetry events and timing spans.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Event names ───────────────────────────────────────────────────────────

/// Event names emitted by the runtime.
pub mod names {
    pub const CALL_START: &str = "call.start";
    pub const CALL_STOP: &str = "call.stop";
    pub const CALL_SUMMARY: &str = "call.summary";
    pub const STREAM_START: &str = "stream.start";
    pub const STREAM_CHUNK: &str = "stream.chunk";
    pub const STREAM_STOP: &str = "stream.stop";
    pub const STREAM_SUMMARY: &str = "stream.summary";
    pub const HOOK_ERROR: &str = "hook.error";
    pub const TOOL_EXECUTE: &str = "tool.execute";
    pub const TOKEN_LIMIT_WARNING: &str = "token_limit.warning";
    pub const DISCLOSURE_PROCESS_RESULTS: &str = "progressive_disclosure.process_results";
    pub const DISCLOSURE_COMPACT: &str = "progressive_disclosure.compact";
}

// ── Event ─────────────────────────────────────────────────────────────────

/// A structured telemetry event: a name, numeric measurements, and
/// descriptive metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryEvent {
    pub name: String,
    #[serde(default)]
    pub measurements: Map<String, Value>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            measurements: Map::new(),
            metadata: Map::new(),
            timestamp: Utc::now(),
        }
    }

    /// Add a measurement.
    pub fn measure(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.measurements.insert(key.to_string(), value.into());
        self
    }

    /// Add a metadata entry.
    pub fn meta(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    /// Merge a metadata map, overwriting existing keys.
    pub fn with_metadata(mut self, metadata: &Map<String, Value>) -> Self {
        for (k, v) in metadata {
            self.metadata.insert(k.clone(), v.clone());
        }
        self
    }

    pub fn measurement_u64(&self, key: &str) -> Option<u64> {
        self.measurements.get(key).and_then(|v| v.as_u64())
    }

    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}

// ── Span ──────────────────────────────────────────────────────────────────

/// An in-flight timed operation. Ending it yields the elapsed milliseconds.
#[derive(Debug, Clone)]
pub struct Span {
    /// Event name prefix, e.g. "call" → "call.start"/"call.stop".
    pub prefix: String,
    /// Metadata attached to both start and stop events.
    pub metadata: Map<String, Value>,
    /// When the span started.
    pub started_at: DateTime<Utc>,
}

impl Span {
    pub fn new(prefix: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            prefix: prefix.into(),
            metadata,
            started_at: Utc::now(),
        }
    }

    /// Milliseconds since the span started.
    pub fn elapsed_ms(&self) -> u64 {
        Utc::now()
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    pub fn start_event(&self) -> TelemetryEvent {
        TelemetryEvent::new(format!("{}.start", self.prefix))
            .measure("system_time", self.started_at.timestamp_millis())
            .with_metadata(&self.metadata)
    }

    pub fn stop_event(&self, status: &str) -> TelemetryEvent {
        TelemetryEvent::new(format!("{}.stop", self.prefix))
            .measure("duration", self.elapsed_ms())
            .with_metadata(&self.metadata)
            .meta("status", status)
    }
}
