//! Telemetry sinks — fire-and-forget observers of runtime events.

use crate::model::TelemetryEvent;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Receives telemetry events. Implementations must not block.
pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: &TelemetryEvent);
}

/// Writes every event to the `tracing` log at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: &TelemetryEvent) {
        tracing::debug!(
            event = %event.name,
            measurements = %serde_json::Value::Object(event.measurements.clone()),
            metadata = %serde_json::Value::Object(event.metadata.clone()),
            "telemetry"
        );
    }
}

/// Keeps events in memory, oldest first. Useful for tests and inspection.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: RwLock<Vec<TelemetryEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events.
    pub fn events(&self) -> Vec<TelemetryEvent> {
        self.events
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Recorded events with the given name.
    pub fn named(&self, name: &str) -> Vec<TelemetryEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, event: &TelemetryEvent) {
        self.events
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
    }
}

/// A broadcast-based sink for live subscribers.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct BroadcastSink {
    sender: broadcast::Sender<Arc<TelemetryEvent>>,
}

impl BroadcastSink {
    /// Create a new sink with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<TelemetryEvent>> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl TelemetrySink for BroadcastSink {
    fn emit(&self, event: &TelemetryEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event.clone()));
    }
}
