//! Progressive disclosure: shrinking tool results and pruning old
//! context so a long tool loop stays inside its token budget.

pub mod compaction;
pub mod hooks;
pub mod processors;

use ostinato_config::DisclosureConfig;
use serde::{Deserialize, Serialize};

pub use compaction::{
    CompactionStrategy, Compactor, DigestSummarizer, Summarizer, age_based, sliding_window,
    summarize_old, token_budget,
};
pub use hooks::DisclosureHooks;
pub use processors::{ResultProcessor, SampleStrategy, process_results};

/// Which processors and compaction steps run, and with what limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DisclosureSettings {
    pub truncate: Option<usize>,
    pub summarize_threshold: Option<usize>,
    pub sample: Option<usize>,
    #[serde(default)]
    pub sample_strategy: SampleStrategy,
    pub sliding_window: Option<usize>,
    pub token_budget: Option<u64>,
}

impl DisclosureSettings {
    pub fn from_config(config: &DisclosureConfig) -> Self {
        Self {
            truncate: config.truncate,
            summarize_threshold: config.summarize_threshold,
            sample: config.sample,
            sample_strategy: SampleStrategy::default(),
            sliding_window: config.sliding_window,
            token_budget: config.token_budget,
        }
    }

    /// Result processors in application order: truncate, summarize, sample.
    pub fn processors(&self) -> Vec<ResultProcessor> {
        let mut processors = Vec::new();
        if let Some(max_size) = self.truncate {
            processors.push(ResultProcessor::Truncate { max_size });
        }
        if let Some(threshold) = self.summarize_threshold {
            processors.push(ResultProcessor::Summarize { threshold });
        }
        if let Some(size) = self.sample {
            processors.push(ResultProcessor::Sample {
                size,
                strategy: self.sample_strategy,
            });
        }
        processors
    }

    /// Compaction steps in application order: sliding window, then token budget.
    pub fn compaction(&self) -> Vec<CompactionStrategy> {
        let mut steps = Vec::new();
        if let Some(keep) = self.sliding_window {
            steps.push(CompactionStrategy::SlidingWindow { keep });
        }
        if let Some(budget) = self.token_budget {
            steps.push(CompactionStrategy::TokenBudget { budget });
        }
        steps
    }

    pub fn is_enabled(&self) -> bool {
        !self.processors().is_empty() || !self.compaction().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config_order() {
        let config = DisclosureConfig {
            truncate: Some(100),
            summarize_threshold: None,
            sample: Some(3),
            sliding_window: None,
            token_budget: Some(500),
        };
        let settings = DisclosureSettings::from_config(&config);
        let names: Vec<_> = settings.processors().iter().map(ResultProcessor::name).collect();
        assert_eq!(names, vec!["truncate", "sample"]);
        assert_eq!(settings.compaction(), vec![CompactionStrategy::TokenBudget { budget: 500 }]);
        assert!(settings.is_enabled());
        assert!(!DisclosureSettings::default().is_enabled());
    }
}
