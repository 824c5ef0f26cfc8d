//! The conversation context of one agent call.
//!
//! A [`Context`] groups messages into numbered [`Iteration`]s and keeps
//! per-iteration token accounting. Every operation returns a new value
//! and leaves its receiver untouched; compaction replaces the context
//! rather than editing it.
//!
//! Invariants:
//! - a context always holds at least one iteration
//! - `cumulative_tokens` never decreases with iteration number

pub mod token;

use chrono::{DateTime, Duration, Utc};
use ostinato_core::error::{Error, Result};
use ostinato_core::message::{ContentPart, Message, WireMessage};
use ostinato_core::tool::{ToolCall, ToolResult};
use ostinato_core::usage::TokenUsage;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use token::{
    CharHeuristicEstimator, MessageOverheadEstimator, TokenEstimator, estimate_tokens,
};

/// Options for [`Context::new`].
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    /// Placed as a system message ahead of the user input.
    pub system_prompt: Option<String>,
}

/// Per-iteration metadata.
///
/// The typed fields are the well-known keys; anything else lives in
/// `extra` and round-trips through serde alongside them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IterationMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cumulative_tokens: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub summarized: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarized_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One logical turn grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Iteration {
    pub number: u32,
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Iterations without a timestamp are never considered old.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: IterationMetadata,
}

impl Iteration {
    pub fn new(number: u32) -> Self {
        Self {
            number,
            messages: Vec::new(),
            started_at: Some(Utc::now()),
            metadata: IterationMetadata::default(),
        }
    }

    /// Mark this iteration as summarized, keeping other metadata.
    pub fn mark_as_summarized(&self, summary: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.metadata.summarized = true;
        next.metadata.summary = Some(summary.into());
        next.metadata.summarized_at = Some(Utc::now());
        next
    }

    pub fn is_summarized(&self) -> bool {
        self.metadata.summarized
    }

    pub fn summary(&self) -> Option<&str> {
        self.metadata.summary.as_deref()
    }

    /// Set one metadata key.
    ///
    /// Well-known keys must carry a value of the right shape (a usage
    /// record for `current_usage`, a bool for `summarized`, ...);
    /// anything else is stored as-is.
    pub fn update_metadata(&self, key: &str, value: Value) -> Result<Self> {
        let mut map = match serde_json::to_value(&self.metadata) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        map.insert(key.to_string(), value);
        let metadata: IterationMetadata = serde_json::from_value(Value::Object(map))
            .map_err(|e| Error::Validation(format!("invalid value for metadata key `{key}`: {e}")))?;
        let mut next = self.clone();
        next.metadata = metadata;
        Ok(next)
    }

    fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// The accumulated conversation state for one agent call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    pub iterations: Vec<Iteration>,
    pub current_iteration: u32,
}

impl Context {
    /// Start a context from the call input.
    ///
    /// A map input with a string `message` field contributes that text;
    /// a string input is used as-is; anything else is serialized to JSON.
    pub fn new(input: &Value, options: &ContextOptions) -> Self {
        let mut first = Iteration::new(1);
        if let Some(system) = &options.system_prompt {
            first.messages.push(Message::system(system.clone()));
        }
        first.messages.push(Message::user(input_text(input)));
        Self {
            iterations: vec![first],
            current_iteration: 1,
        }
    }

    /// Rebuild a context from existing iterations (e.g. a saved transcript).
    pub fn from_iterations(iterations: Vec<Iteration>) -> Result<Self> {
        let Some(last) = iterations.last() else {
            return Err(Error::Validation("a context needs at least one iteration".into()));
        };
        let current_iteration = last.number;
        Ok(Self {
            iterations,
            current_iteration,
        })
    }

    fn current_index(&mut self) -> usize {
        if self.iterations.is_empty() {
            self.iterations.push(Iteration::new(self.current_iteration));
        }
        let current = self.current_iteration;
        self.iterations
            .iter()
            .rposition(|it| it.number == current)
            .unwrap_or(self.iterations.len() - 1)
    }

    fn current_mut(&mut self) -> &mut Iteration {
        let idx = self.current_index();
        &mut self.iterations[idx]
    }

    fn current(&self) -> Option<&Iteration> {
        self.iterations
            .iter()
            .rev()
            .find(|it| it.number == self.current_iteration)
            .or_else(|| self.iterations.last())
    }

    /// Open the next iteration.
    pub fn begin_iteration(&self) -> Self {
        let mut next = self.clone();
        next.current_iteration += 1;
        next.iterations.push(Iteration::new(next.current_iteration));
        next
    }

    /// Append an assistant message to the current iteration.
    pub fn add_assistant_message(&self, content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        let mut next = self.clone();
        next.current_mut()
            .messages
            .push(Message::assistant(content, tool_calls));
        next
    }

    /// Fold a batch of tool results into one user-role message, in the
    /// order given.
    pub fn add_tool_results(&self, results: &[ToolResult]) -> Self {
        let parts = results
            .iter()
            .map(|result| ContentPart::ToolResult {
                tool_use_id: result.tool_call_id.clone(),
                content: result.to_json().to_string(),
                is_error: result.is_error(),
            })
            .collect();
        let mut next = self.clone();
        next.current_mut().messages.push(Message::tool_results(parts));
        next
    }

    /// Record usage on the current iteration and refresh its cumulative
    /// totals. Repeated calls within one iteration accumulate.
    pub fn add_token_usage(&self, usage: TokenUsage) -> Self {
        let mut next = self.clone();
        let idx = next.current_index();

        let metadata = &next.iterations[idx].metadata;
        let before = match metadata.cumulative_tokens {
            Some(cumulative) => cumulative.saturating_sub(metadata.current_usage.unwrap_or_default()),
            None => next.iterations[..idx]
                .iter()
                .rev()
                .find_map(|it| it.metadata.cumulative_tokens)
                .unwrap_or_default(),
        };

        let iteration = &mut next.iterations[idx];
        let current_usage = iteration.metadata.current_usage.unwrap_or_default() + usage;
        iteration.metadata.current_usage = Some(current_usage);
        iteration.metadata.cumulative_tokens = Some(before + current_usage);
        next
    }

    /// Record a partial usage map (`input_tokens`, `output_tokens`,
    /// `total_tokens`, any of which may be missing).
    pub fn add_token_usage_map(&self, usage: &Value) -> Self {
        self.add_token_usage(TokenUsage::from_value(usage))
    }

    /// Totals as of the latest iteration that recorded usage.
    pub fn cumulative_tokens(&self) -> TokenUsage {
        self.iterations
            .iter()
            .rev()
            .find_map(|it| it.metadata.cumulative_tokens)
            .unwrap_or_default()
    }

    pub fn exceeded_max_iterations(&self, max: u32) -> bool {
        self.current_iteration >= max
    }

    /// Tool calls of the current iteration's last message, when that
    /// message is an assistant turn that requested tools.
    pub fn extract_tool_calls(&self) -> Vec<ToolCall> {
        match self.current().and_then(Iteration::last_message) {
            Some(message) if message.has_tool_calls() => message.tool_calls.clone().unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    /// Flatten every iteration into provider wire messages.
    pub fn to_messages(&self) -> Vec<WireMessage> {
        self.iterations
            .iter()
            .flat_map(|it| it.messages.iter())
            .map(WireMessage::from)
            .collect()
    }

    /// All messages in order, without wire conversion.
    pub fn messages(&self) -> impl Iterator<Item = &Message> {
        self.iterations.iter().flat_map(|it| it.messages.iter())
    }

    pub fn get_iteration(&self, number: i64) -> Option<&Iteration> {
        if number < 0 {
            return None;
        }
        self.iterations.iter().find(|it| i64::from(it.number) == number)
    }

    pub fn count_iterations(&self) -> usize {
        self.iterations.len()
    }

    /// Iterations numbered `start..=end`. Out-of-range bounds are clamped.
    pub fn get_iteration_range(&self, start: i64, end: i64) -> Vec<&Iteration> {
        if start > end {
            return Vec::new();
        }
        self.iterations
            .iter()
            .filter(|it| (start..=end).contains(&i64::from(it.number)))
            .collect()
    }

    /// Keep only the last `n` iterations. At least one is always kept.
    pub fn keep_last_iterations(&self, n: usize) -> Self {
        let n = n.max(1);
        if n >= self.iterations.len() {
            return self.clone();
        }
        let skip = self.iterations.len() - n;
        self.pruned(self.iterations[skip..].to_vec())
    }

    /// Drop iterations that started more than `max_age_secs` ago.
    pub fn remove_old_iterations(&self, max_age_secs: u64) -> Self {
        self.remove_old_iterations_at(Utc::now(), max_age_secs)
    }

    /// [`remove_old_iterations`](Self::remove_old_iterations) against an
    /// explicit clock. If every iteration is old, the newest one stays.
    pub fn remove_old_iterations_at(&self, now: DateTime<Utc>, max_age_secs: u64) -> Self {
        let max_age = i64::try_from(max_age_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX);
        let cutoff = now.checked_sub_signed(max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let mut kept: Vec<Iteration> = self
            .iterations
            .iter()
            .filter(|it| it.started_at.is_none_or(|started| started >= cutoff))
            .cloned()
            .collect();
        if kept.is_empty() {
            kept.extend(self.iterations.last().cloned());
        }
        self.pruned(kept)
    }

    /// A context holding `kept`, a subset of this one's iterations.
    ///
    /// When the first kept iteration has no running total of its own, it
    /// takes the total recorded before it, so usage already spent on
    /// dropped iterations still counts.
    fn pruned(&self, mut kept: Vec<Iteration>) -> Self {
        if let Some(first) = kept.first_mut() {
            if first.metadata.cumulative_tokens.is_none() {
                let number = first.number;
                first.metadata.cumulative_tokens = self
                    .iterations
                    .iter()
                    .take_while(|it| it.number != number)
                    .filter_map(|it| it.metadata.cumulative_tokens)
                    .last();
            }
        }
        Self {
            iterations: kept,
            current_iteration: self.current_iteration,
        }
    }

    /// Replace one iteration (matched by number).
    pub fn replace_iteration(&self, iteration: Iteration) -> Self {
        let mut next = self.clone();
        if let Some(slot) = next.iterations.iter_mut().find(|it| it.number == iteration.number) {
            *slot = iteration;
        }
        next
    }

    pub fn estimate_token_count(&self, estimator: &dyn TokenEstimator) -> u64 {
        estimator.estimate_context(self)
    }

    pub fn exceeds_token_budget(&self, budget: u64, estimator: &dyn TokenEstimator) -> bool {
        self.estimate_token_count(estimator) > budget
    }

    /// Tokens left before `budget`; zero once it is exceeded.
    pub fn tokens_remaining(&self, budget: u64, estimator: &dyn TokenEstimator) -> u64 {
        budget.saturating_sub(self.estimate_token_count(estimator))
    }

    /// Estimated size as a fraction of `budget`; may exceed 1.0. A zero
    /// budget is fully used by any content.
    pub fn budget_utilization(&self, budget: u64, estimator: &dyn TokenEstimator) -> f64 {
        let used = self.estimate_token_count(estimator);
        if budget == 0 {
            return if used == 0 { 0.0 } else { f64::INFINITY };
        }
        used as f64 / budget as f64
    }
}

fn input_text(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => input.to_string(),
        },
        other => other.to_string(),
    }
}
