//! Per-agent loop settings, derived from configuration.

use ostinato_config::AppConfig;
use serde::{Deserialize, Serialize};

pub use ostinato_config::{BudgetStrategy, ToolErrorPolicy};

/// Bounds and policies for the tool-calling loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopSettings {
    /// Provider round trips allowed per call
    pub max_iterations: u32,
    /// Applies to failed tool results and to failed provider calls
    pub tool_error_policy: ToolErrorPolicy,
    /// Dispatch the tool calls of one response concurrently
    pub concurrent_tools: bool,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            tool_error_policy: ToolErrorPolicy::Continue,
            concurrent_tools: true,
        }
    }
}

impl LoopSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_iterations: config.agent.max_iterations,
            tool_error_policy: config.agent.tool_error_policy,
            ..Self::default()
        }
    }
}

/// Cumulative token limits for one call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TokenLimits {
    /// `None` means unlimited
    pub budget: Option<u64>,
    /// Fraction of the budget at which `token_limit.warning` fires
    pub warning_threshold: f64,
    pub strategy: BudgetStrategy,
}

impl Default for TokenLimits {
    fn default() -> Self {
        Self {
            budget: None,
            warning_threshold: 0.8,
            strategy: BudgetStrategy::Warn,
        }
    }
}

impl TokenLimits {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            budget: config.token_limits.budget,
            warning_threshold: config.token_limits.warning_threshold,
            strategy: config.token_limits.strategy,
        }
    }

    /// Token count at which the warning threshold is crossed.
    pub fn warning_at(&self) -> Option<u64> {
        self.budget
            .map(|budget| (budget as f64 * self.warning_threshold).ceil() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_config() {
        let mut config = AppConfig::default();
        config.agent.max_iterations = 4;
        config.agent.tool_error_policy = ToolErrorPolicy::Halt;
        config.token_limits.budget = Some(1_000);
        config.token_limits.strategy = BudgetStrategy::Halt;

        let settings = LoopSettings::from_config(&config);
        assert_eq!(settings.max_iterations, 4);
        assert_eq!(settings.tool_error_policy, ToolErrorPolicy::Halt);
        assert!(settings.concurrent_tools);

        let limits = TokenLimits::from_config(&config);
        assert_eq!(limits.budget, Some(1_000));
        assert_eq!(limits.strategy, BudgetStrategy::Halt);
        assert_eq!(limits.warning_at(), Some(800));
    }

    #[test]
    fn unlimited_has_no_warning_point() {
        assert_eq!(TokenLimits::default().warning_at(), None);
    }
}
