//! Token usage accounting.

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

/// Token counts for one provider response, or a running total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub total_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens: input_tokens.saturating_add(output_tokens),
        }
    }

    /// Build usage from a partial record.
    ///
    /// Missing counts default to 0; a missing total is derived as
    /// `input + output`.
    pub fn from_partial(input: Option<u64>, output: Option<u64>, total: Option<u64>) -> Self {
        let input_tokens = input.unwrap_or(0);
        let output_tokens = output.unwrap_or(0);
        Self {
            input_tokens,
            output_tokens,
            total_tokens: total.unwrap_or(input_tokens.saturating_add(output_tokens)),
        }
    }

    /// Read usage from a provider's JSON usage object.
    ///
    /// Accepts `input_tokens`/`output_tokens` as well as the
    /// `prompt_tokens`/`completion_tokens` spelling.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let field = |names: &[&str]| names.iter().find_map(|n| value.get(*n).and_then(|v| v.as_u64()));
        Self::from_partial(
            field(&["input_tokens", "prompt_tokens"]),
            field(&["output_tokens", "completion_tokens"]),
            field(&["total_tokens"]),
        )
    }

    /// Field-wise difference, clamped at zero.
    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self {
            input_tokens: self.input_tokens.saturating_sub(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_sub(rhs.output_tokens),
            total_tokens: self.total_tokens.saturating_sub(rhs.total_tokens),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.total_tokens == 0
    }
}

impl Add for TokenUsage {
    type Output = TokenUsage;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            input_tokens: self.input_tokens.saturating_add(rhs.input_tokens),
            output_tokens: self.output_tokens.saturating_add(rhs.output_tokens),
            total_tokens: self.total_tokens.saturating_add(rhs.total_tokens),
        }
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}
