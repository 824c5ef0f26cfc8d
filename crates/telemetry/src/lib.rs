//! Structured telemetry for Ostinato.
//!
//! The runtime emits named events with measurements and metadata at
//! fixed points: call and stream lifecycles, hook failures, tool
//! execution, token-limit warnings, and progressive-disclosure work.
//! Sinks decide what happens to them (log, collect, broadcast).

pub mod engine;
pub mod model;
pub mod sink;

pub use engine::Telemetry;
pub use model::{Span, TelemetryEvent, names};
pub use sink::{BroadcastSink, MemorySink, TelemetrySink, TracingSink};
