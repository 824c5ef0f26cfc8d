//! The telemetry handle threaded through the runtime.

use crate::model::{Span, TelemetryEvent};
use crate::sink::{TelemetrySink, TracingSink};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Fans events out to every configured sink.
///
/// Cheap to clone. A disabled handle drops events without touching the
/// sinks.
#[derive(Clone)]
pub struct Telemetry {
    sinks: Arc<Vec<Arc<dyn TelemetrySink>>>,
    enabled: bool,
}

impl Telemetry {
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self {
            sinks: Arc::new(sinks),
            enabled: true,
        }
    }

    /// A handle that drops everything.
    pub fn disabled() -> Self {
        Self {
            sinks: Arc::new(Vec::new()),
            enabled: false,
        }
    }

    /// Build a handle from the telemetry config section.
    ///
    /// `log_events` adds a [`TracingSink`] in front of `extra`.
    pub fn from_config(config: &ostinato_config::TelemetryConfig, extra: Vec<Arc<dyn TelemetrySink>>) -> Self {
        if !config.enabled {
            return Self::disabled();
        }
        let mut sinks: Vec<Arc<dyn TelemetrySink>> = Vec::new();
        if config.log_events {
            sinks.push(Arc::new(TracingSink));
        }
        sinks.extend(extra);
        Self::new(sinks)
    }

    /// Return a copy of this handle with one more sink attached.
    pub fn with_sink(&self, sink: Arc<dyn TelemetrySink>) -> Self {
        let mut sinks: Vec<_> = self.sinks.iter().cloned().collect();
        sinks.push(sink);
        Self {
            sinks: Arc::new(sinks),
            enabled: self.enabled,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Emit an event to every sink.
    pub fn emit(&self, event: TelemetryEvent) {
        if !self.enabled {
            return;
        }
        for sink in self.sinks.iter() {
            sink.emit(&event);
        }
    }

    /// Start a span and emit its `<prefix>.start` event.
    pub fn start_span(&self, prefix: &str, metadata: Map<String, Value>) -> Span {
        let span = Span::new(prefix, metadata);
        self.emit(span.start_event());
        span
    }

    /// Emit the `<prefix>.stop` event for a span.
    pub fn stop_span(&self, span: &Span, status: &str) {
        self.emit(span.stop_event(status));
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new(vec![Arc::new(TracingSink)])
    }
}

impl std::fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Telemetry")
            .field("sinks", &self.sinks.len())
            .field("enabled", &self.enabled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    #[test]
    fn fans_out_to_all_sinks() {
        let a = Arc::new(MemorySink::new());
        let b = Arc::new(MemorySink::new());
        let telemetry = Telemetry::new(vec![a.clone(), b.clone()]);
        telemetry.emit(TelemetryEvent::new("x"));
        assert_eq!(a.events().len(), 1);
        assert_eq!(b.events().len(), 1);
    }

    #[test]
    fn disabled_drops_events() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::disabled().with_sink(sink.clone());
        telemetry.emit(TelemetryEvent::new("x"));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn span_emits_start_and_stop() {
        let sink = Arc::new(MemorySink::new());
        let telemetry = Telemetry::new(vec![sink.clone()]);
        let span = telemetry.start_span("stream", Map::new());
        telemetry.stop_span(&span, "error");

        let events = sink.events();
        assert_eq!(events[0].name, "stream.start");
        assert_eq!(events[1].name, "stream.stop");
        assert_eq!(events[1].metadata_str("status"), Some("error"));
    }

    #[test]
    fn from_config_respects_enabled_flag() {
        let sink = Arc::new(MemorySink::new());
        let config = ostinato_config::TelemetryConfig {
            enabled: false,
            log_events: true,
        };
        let telemetry = Telemetry::from_config(&config, vec![sink.clone()]);
        assert!(!telemetry.is_enabled());
        telemetry.emit(TelemetryEvent::new("x"));
        assert!(sink.events().is_empty());
    }
}
