//! Built-in iteration checks.

use super::{IterationComplete, IterationStart};
use crate::settings::BudgetStrategy;
use ostinato_core::error::{Error, LlmError, Result};
use ostinato_telemetry::{TelemetryEvent, names};
use tracing::warn;

/// Stop once the iteration number passes `max_iterations`, or once the
/// token budget is spent under the `halt` strategy.
pub fn on_iteration_start(input: &IterationStart<'_>) -> Result<()> {
    let max = input.env.max_iterations;
    if input.iteration > max {
        return Err(LlmError::MaxIterationsExceeded {
            max,
            current: input.iteration,
        }
        .into());
    }

    let limits = &input.env.token_limits;
    if let (Some(budget), BudgetStrategy::Halt) = (limits.budget, limits.strategy) {
        let used = input.context.cumulative_tokens().total_tokens;
        if used >= budget {
            return Err(Error::Budget { budget, used });
        }
    }
    Ok(())
}

/// Emit `token_limit.warning` when cumulative usage reaches the
/// warning threshold. Never fails.
pub fn on_iteration_complete(input: &IterationComplete<'_>) -> Result<()> {
    let limits = &input.env.token_limits;
    let (Some(budget), Some(warn_at)) = (limits.budget, limits.warning_at()) else {
        return Ok(());
    };
    let used = input.context.cumulative_tokens().total_tokens;
    if used < warn_at {
        return Ok(());
    }

    let utilization = if budget == 0 { 1.0 } else { used as f64 / budget as f64 };
    warn!(
        agent = %input.env.agent,
        iteration = input.iteration,
        used,
        budget,
        "Token usage crossed warning threshold"
    );
    input.env.telemetry.emit(
        TelemetryEvent::new(names::TOKEN_LIMIT_WARNING)
            .measure("used", used)
            .measure("budget", budget)
            .measure("utilization", utilization)
            .meta("agent", input.env.agent.as_str())
            .meta("iteration", input.iteration)
            .meta(
                "strategy",
                match limits.strategy {
                    BudgetStrategy::Warn => "warn",
                    BudgetStrategy::Halt => "halt",
                },
            ),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Context, ContextOptions};
    use crate::hooks::HookEnv;
    use crate::settings::TokenLimits;
    use ostinato_core::error::ErrorKind;
    use ostinato_core::provider::ClientSpec;
    use ostinato_core::usage::TokenUsage;
    use ostinato_telemetry::{MemorySink, Telemetry};
    use serde_json::json;
    use std::sync::Arc;

    fn env(limits: TokenLimits, telemetry: Telemetry) -> HookEnv {
        HookEnv {
            agent: "tester".into(),
            client: ClientSpec::new("scripted", "m"),
            max_iterations: 3,
            token_limits: limits,
            telemetry,
        }
    }

    fn ctx_with_usage(total: u64) -> Context {
        Context::new(&json!("hi"), &ContextOptions::default()).add_token_usage(TokenUsage::new(total, 0))
    }

    #[test]
    fn max_iterations_allows_up_to_the_limit() {
        let env = env(TokenLimits::default(), Telemetry::disabled());
        let ctx = ctx_with_usage(0);
        for iteration in 1..=3 {
            let start = IterationStart { env: &env, iteration, context: &ctx };
            assert!(on_iteration_start(&start).is_ok());
        }
        let start = IterationStart { env: &env, iteration: 4, context: &ctx };
        let err = on_iteration_start(&start).unwrap_err();
        assert!(matches!(
            err,
            Error::Llm(LlmError::MaxIterationsExceeded { max: 3, current: 4 })
        ));
    }

    #[test]
    fn halt_strategy_stops_on_spent_budget() {
        let limits = TokenLimits {
            budget: Some(100),
            warning_threshold: 0.8,
            strategy: BudgetStrategy::Halt,
        };
        let env = env(limits, Telemetry::disabled());
        let under = ctx_with_usage(99);
        assert!(on_iteration_start(&IterationStart { env: &env, iteration: 1, context: &under }).is_ok());

        let over = ctx_with_usage(100);
        let err = on_iteration_start(&IterationStart { env: &env, iteration: 1, context: &over }).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Budget);
    }

    #[test]
    fn warn_strategy_never_stops() {
        let limits = TokenLimits {
            budget: Some(10),
            ..TokenLimits::default()
        };
        let env = env(limits, Telemetry::disabled());
        let ctx = ctx_with_usage(1_000);
        assert!(on_iteration_start(&IterationStart { env: &env, iteration: 1, context: &ctx }).is_ok());
    }

    #[test]
    fn warning_event_at_threshold() {
        let sink = Arc::new(MemorySink::new());
        let limits = TokenLimits {
            budget: Some(100),
            warning_threshold: 0.5,
            strategy: BudgetStrategy::Warn,
        };
        let env = env(limits, Telemetry::new(vec![sink.clone()]));

        let quiet = ctx_with_usage(49);
        let complete = IterationComplete { env: &env, iteration: 1, context: &quiet, results: &[], usage: TokenUsage::default() };
        on_iteration_complete(&complete).unwrap();
        assert!(sink.named(names::TOKEN_LIMIT_WARNING).is_empty());

        let loud = ctx_with_usage(50);
        let complete = IterationComplete { env: &env, iteration: 2, context: &loud, results: &[], usage: TokenUsage::default() };
        on_iteration_complete(&complete).unwrap();
        let events = sink.named(names::TOKEN_LIMIT_WARNING);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].measurement_u64("used"), Some(50));
        assert_eq!(events[0].metadata_str("strategy"), Some("warn"));
    }
}
