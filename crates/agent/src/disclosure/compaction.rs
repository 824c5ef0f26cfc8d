//! Context compaction.
//!
//! Each strategy returns a new [`Context`] with fewer iterations and
//! always keeps at least one. [`Compactor`] runs a strategy and reports
//! the effect as a `progressive_disclosure.compact` event.

use crate::context::{Context, Iteration, MessageOverheadEstimator, TokenEstimator};
use ostinato_core::message::{Message, Role};
use ostinato_telemetry::{Telemetry, TelemetryEvent, names};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// How to shrink a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum CompactionStrategy {
    SlidingWindow { keep: usize },
    TokenBudget { budget: u64 },
    AgeBased { max_age_secs: u64 },
    SummarizeOld { keep_recent: usize },
}

impl CompactionStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            Self::SlidingWindow { .. } => "sliding_window",
            Self::TokenBudget { .. } => "token_budget",
            Self::AgeBased { .. } => "age_based",
            Self::SummarizeOld { .. } => "summarize_old",
        }
    }
}

/// Produces the text that stands in for summarized iterations.
pub trait Summarizer: Send + Sync {
    fn summarize(&self, iterations: &[Iteration]) -> String;
}

/// Describes dropped iterations by counting what they held.
#[derive(Debug, Clone, Copy, Default)]
pub struct DigestSummarizer;

impl Summarizer for DigestSummarizer {
    fn summarize(&self, iterations: &[Iteration]) -> String {
        let messages: Vec<&Message> = iterations.iter().flat_map(|it| it.messages.iter()).collect();
        let tools: BTreeSet<&str> = messages
            .iter()
            .flat_map(|m| m.tool_calls.iter().flatten())
            .map(|call| call.name.as_str())
            .collect();
        let calls = messages
            .iter()
            .map(|m| m.tool_calls.as_ref().map_or(0, Vec::len))
            .sum::<usize>();
        let answers = messages
            .iter()
            .filter(|m| m.role == Role::Assistant && !m.has_tool_calls())
            .count();

        let mut digest = format!(
            "{} earlier iteration(s) with {} message(s)",
            iterations.len(),
            messages.len()
        );
        if calls > 0 {
            let names: Vec<&str> = tools.into_iter().collect();
            digest.push_str(&format!("; {calls} tool call(s): {}", names.join(", ")));
        }
        if answers > 0 {
            digest.push_str(&format!("; {answers} assistant reply(ies)"));
        }
        for previous in iterations.iter().filter_map(Iteration::summary) {
            digest.push('\n');
            digest.push_str(previous);
        }
        digest
    }
}

/// Keep the last `keep` iterations.
pub fn sliding_window(context: &Context, keep: usize) -> Context {
    context.keep_last_iterations(keep)
}

/// Drop the oldest iterations until the estimate fits in `budget`.
pub fn token_budget(context: &Context, budget: u64, estimator: &dyn TokenEstimator) -> Context {
    let sizes: Vec<u64> = context
        .iterations
        .iter()
        .map(|it| estimator.estimate_messages(&mut it.messages.iter()))
        .collect();
    let mut total: u64 = sizes.iter().sum();
    let mut drop = 0;
    while total > budget && drop + 1 < sizes.len() {
        total -= sizes[drop];
        drop += 1;
    }
    context.keep_last_iterations(sizes.len() - drop)
}

/// Drop iterations older than `max_age_secs`.
pub fn age_based(context: &Context, max_age_secs: u64) -> Context {
    context.remove_old_iterations(max_age_secs)
}

/// Collapse everything but the last `keep_recent` iterations into one
/// summarized iteration holding a single system note.
pub fn summarize_old(context: &Context, keep_recent: usize, summarizer: &dyn Summarizer) -> Context {
    let keep_recent = keep_recent.max(1);
    let count = context.iterations.len();
    if count <= keep_recent {
        return context.clone();
    }
    let (old, recent) = context.iterations.split_at(count - keep_recent);
    let (Some(first), Some(last)) = (old.first(), old.last()) else {
        return context.clone();
    };

    let summary = summarizer.summarize(old);
    let mut merged = Iteration::new(last.number);
    merged.started_at = last.started_at;
    merged.metadata.cumulative_tokens = last.metadata.cumulative_tokens;
    merged.messages.push(Message::system(format!(
        "[Summary of iterations {}-{}]\n{summary}",
        first.number, last.number
    )));
    let merged = merged.mark_as_summarized(summary);

    let mut iterations = Vec::with_capacity(recent.len() + 1);
    iterations.push(merged);
    iterations.extend_from_slice(recent);
    Context {
        iterations,
        current_iteration: context.current_iteration,
    }
}

/// Runs compaction strategies with a fixed estimator and summarizer.
#[derive(Clone)]
pub struct Compactor {
    estimator: Arc<dyn TokenEstimator>,
    summarizer: Arc<dyn Summarizer>,
}

impl Default for Compactor {
    fn default() -> Self {
        Self {
            estimator: Arc::new(MessageOverheadEstimator::default()),
            summarizer: Arc::new(DigestSummarizer),
        }
    }
}

impl std::fmt::Debug for Compactor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compactor").finish_non_exhaustive()
    }
}

impl Compactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    pub fn compact(&self, context: &Context, strategy: CompactionStrategy, telemetry: &Telemetry) -> Context {
        let compacted = match strategy {
            CompactionStrategy::SlidingWindow { keep } => sliding_window(context, keep),
            CompactionStrategy::TokenBudget { budget } => token_budget(context, budget, self.estimator()),
            CompactionStrategy::AgeBased { max_age_secs } => age_based(context, max_age_secs),
            CompactionStrategy::SummarizeOld { keep_recent } => {
                summarize_old(context, keep_recent, self.summarizer.as_ref())
            }
        };

        let before = context.count_iterations();
        let after = compacted.count_iterations();
        debug!(strategy = strategy.name(), before, after, "Compacted context");
        telemetry.emit(
            TelemetryEvent::new(names::DISCLOSURE_COMPACT)
                .measure("before_count", before)
                .measure("after_count", after)
                .measure("removed", before.saturating_sub(after))
                .meta("strategy", strategy.name()),
        );
        compacted
    }
}
