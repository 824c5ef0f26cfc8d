use super::DisclosureSettings;
use super::compaction::Compactor;
use super::processors::process_results;
use crate::context::{Context, TokenEstimator};
use crate::hooks::{ContextInput, Hooks, ToolResultsInput};
use ostinato_core::error::Result;
use ostinato_core::tool::ToolResult;
use ostinato_telemetry::{TelemetryEvent, names};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Hooks that apply [`DisclosureSettings`] inside the tool loop.
///
/// Tool results are processed in `prepare_tool_results`; the context is
/// compacted in `prepare_context`. The iteration hooks keep their
/// defaults.
#[derive(Debug, Clone, Default)]
pub struct DisclosureHooks {
    settings: DisclosureSettings,
    compactor: Compactor,
}

impl DisclosureHooks {
    pub fn new(settings: DisclosureSettings) -> Self {
        Self {
            settings,
            compactor: Compactor::default(),
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.compactor = self.compactor.with_estimator(estimator);
        self
    }

    pub fn with_compactor(mut self, compactor: Compactor) -> Self {
        self.compactor = compactor;
        self
    }

    pub fn settings(&self) -> &DisclosureSettings {
        &self.settings
    }
}

impl Hooks for DisclosureHooks {
    fn prepare_tool_results(&self, input: &ToolResultsInput<'_>) -> Result<Option<Vec<ToolResult>>> {
        let processors = self.settings.processors();
        if processors.is_empty() {
            return Ok(None);
        }

        let start = Instant::now();
        let processed = process_results(input.results, &processors);
        let changed = processed
            .iter()
            .zip(input.results)
            .filter(|(after, before)| after != before)
            .count();

        let applied: Vec<&str> = processors.iter().map(|p| p.name()).collect();
        debug!(agent = %input.env.agent, count = processed.len(), changed, "Processed tool results");
        input.env.telemetry.emit(
            TelemetryEvent::new(names::DISCLOSURE_PROCESS_RESULTS)
                .measure("duration", start.elapsed().as_millis() as u64)
                .measure("count", processed.len())
                .measure("changed", changed)
                .meta("agent", input.env.agent.as_str())
                .meta("processors", applied.join(",")),
        );
        Ok(Some(processed))
    }

    fn prepare_context(&self, input: &ContextInput<'_>) -> Result<Option<Context>> {
        let steps = self.settings.compaction();
        if steps.is_empty() {
            return Ok(None);
        }

        // The iteration just opened has no messages yet; compact the
        // history before it and put it back afterwards.
        let context = input.context;
        let mut history = context.clone();
        let open = match context.iterations.last() {
            Some(last) if last.messages.is_empty() && context.iterations.len() > 1 => history.iterations.pop(),
            _ => None,
        };

        let mut compacted = steps.into_iter().fold(history, |ctx, step| {
            self.compactor.compact(&ctx, step, &input.env.telemetry)
        });
        if let Some(mut open) = open {
            if open.metadata.cumulative_tokens.is_none() {
                open.metadata.cumulative_tokens = Some(context.cumulative_tokens()).filter(|u| !u.is_zero());
            }
            compacted.iterations.push(open);
        }
        if compacted.count_iterations() == input.context.count_iterations() {
            return Ok(None);
        }
        Ok(Some(compacted))
    }
}
