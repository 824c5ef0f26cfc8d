//! `ostinato transcript` — Inspect and compact saved contexts.
//!
//! A transcript is the JSON form of a `Context`, or of an agent result
//! carrying one under `context`.

use anyhow::{Context as _, bail};
use ostinato_agent::context::{CharHeuristicEstimator, MessageOverheadEstimator};
use ostinato_agent::{CompactionStrategy, Compactor, Context, TokenEstimator};
use ostinato_config::AppConfig;
use ostinato_telemetry::Telemetry;
use serde_json::Value;
use std::fmt;
use std::path::Path;

/// Size and budget figures for one transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptStats {
    pub iterations: usize,
    pub current_iteration: u32,
    pub messages: usize,
    pub summarized: usize,
    pub estimated_tokens: u64,
    pub reported_tokens: u64,
    pub budget: Option<u64>,
}

impl TranscriptStats {
    pub fn of(context: &Context, estimator: &dyn TokenEstimator, budget: Option<u64>) -> Self {
        Self {
            iterations: context.count_iterations(),
            current_iteration: context.current_iteration,
            messages: context.messages().count(),
            summarized: context.iterations.iter().filter(|i| i.is_summarized()).count(),
            estimated_tokens: context.estimate_token_count(estimator),
            reported_tokens: context.cumulative_tokens().total_tokens,
            budget,
        }
    }

    /// Estimated tokens as a fraction of the budget.
    pub fn utilization(&self) -> Option<f64> {
        self.budget
            .map(|budget| if budget == 0 { 1.0 } else { self.estimated_tokens as f64 / budget as f64 })
    }
}

impl fmt::Display for TranscriptStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Iterations:        {} (current {})", self.iterations, self.current_iteration)?;
        writeln!(f, "Messages:          {}", self.messages)?;
        if self.summarized > 0 {
            writeln!(f, "Summarized:        {}", self.summarized)?;
        }
        writeln!(f, "Estimated tokens:  {}", self.estimated_tokens)?;
        writeln!(f, "Reported tokens:   {}", self.reported_tokens)?;
        match (self.budget, self.utilization()) {
            (Some(budget), Some(u)) => write!(f, "Budget:            {budget} ({:.1}% used)", u * 100.0),
            _ => write!(f, "Budget:            unlimited"),
        }
    }
}

pub fn stats(config: &AppConfig, file: &Path, budget: Option<u64>, chars: bool) -> anyhow::Result<()> {
    let context = load_transcript(file)?;
    let budget = budget.or(config.progressive_disclosure.token_budget);
    let stats = if chars {
        TranscriptStats::of(&context, &CharHeuristicEstimator, budget)
    } else {
        TranscriptStats::of(&context, &MessageOverheadEstimator::default(), budget)
    };
    println!("{stats}");
    Ok(())
}

pub fn compact(
    file: &Path,
    keep_last: Option<usize>,
    max_age: Option<u64>,
    summarize: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let context = load_transcript(file)?;
    let strategy = strategy(keep_last, max_age, summarize)?;
    let compacted = Compactor::new().compact(&context, strategy, &Telemetry::default());
    tracing::info!(
        strategy = strategy.name(),
        before = context.count_iterations(),
        after = compacted.count_iterations(),
        "Compacted transcript"
    );

    let json = serde_json::to_string_pretty(&compacted)?;
    match output {
        Some(path) => std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}

/// The compaction step selected by the command-line flags.
pub fn strategy(keep_last: Option<usize>, max_age: Option<u64>, summarize: bool) -> anyhow::Result<CompactionStrategy> {
    match (keep_last, max_age) {
        (Some(keep), None) if summarize => Ok(CompactionStrategy::SummarizeOld { keep_recent: keep }),
        (Some(keep), None) => Ok(CompactionStrategy::SlidingWindow { keep }),
        (None, Some(secs)) if !summarize => Ok(CompactionStrategy::AgeBased { max_age_secs: secs }),
        (None, Some(_)) => bail!("--summarize only works with --keep-last"),
        (Some(_), Some(_)) => bail!("use either --keep-last or --max-age, not both"),
        (None, None) => bail!("one of --keep-last or --max-age is required"),
    }
}

pub fn load_transcript(path: &Path) -> anyhow::Result<Context> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse_transcript(&raw).with_context(|| format!("parsing {}", path.display()))
}

/// Accepts a bare context or an object holding one under `context`.
pub fn parse_transcript(raw: &str) -> anyhow::Result<Context> {
    let mut value: Value = serde_json::from_str(raw)?;
    if let Some(inner) = value.get_mut("context") {
        value = inner.take();
    }
    let context: Context = serde_json::from_value(value)?;
    Ok(Context::from_iterations(context.iterations)?)
}
