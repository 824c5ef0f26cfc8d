//! Error types for the Ostinato domain.
//!
//! Uses `thiserror` for ergonomic error definitions. The top-level
//! [`Error`] has one variant per error kind an agent call can surface;
//! provider failures keep their own bounded-context enum.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The top-level error type for all agent operations.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// Bad or missing agent setup.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The prompt template failed to render.
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// The output schema is missing or invalid.
    #[error("Schema error: {0}")]
    Schema(String),

    /// The language model call failed (includes max-iteration stops).
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    /// The response could not be coerced into the output type.
    #[error("Parse error: {0}")]
    Parse(String),

    /// A hook explicitly raised an error.
    #[error("Hook error in {hook}: {message}")]
    Hook { hook: String, message: String },

    /// A requested capability is unsupported or the request is malformed.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The token budget was exhausted under a halt strategy.
    #[error("Token budget exceeded: used {used} of {budget} tokens")]
    Budget { budget: u64, used: u64 },
}

/// Alias used throughout the agent crates.
pub type AgentError = Error;

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

/// The kind of an [`Error`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    Prompt,
    Schema,
    Llm,
    Parse,
    Hook,
    Validation,
    Budget,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Config => "config",
            Self::Prompt => "prompt",
            Self::Schema => "schema",
            Self::Llm => "llm",
            Self::Parse => "parse",
            Self::Hook => "hook",
            Self::Validation => "validation",
            Self::Budget => "budget",
        };
        f.write_str(s)
    }
}

impl Error {
    /// Build a hook error attributed to the named hook.
    pub fn hook(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Hook {
            hook: hook.into(),
            message: message.into(),
        }
    }

    /// The error's kind.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::Prompt(_) => ErrorKind::Prompt,
            Self::Schema(_) => ErrorKind::Schema,
            Self::Llm(_) => ErrorKind::Llm,
            Self::Parse(_) => ErrorKind::Parse,
            Self::Hook { .. } => ErrorKind::Hook,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Budget { .. } => ErrorKind::Budget,
        }
    }

    /// Human-readable message, used verbatim by the raising entry points.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl From<ProviderError> for Error {
    fn from(err: ProviderError) -> Self {
        Self::Llm(LlmError::Provider(err))
    }
}

// --- Bounded context errors ---

/// Failures of the language model round trip.
#[derive(Debug, Clone, Error)]
pub enum LlmError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("max iterations ({max}) exceeded at iteration {current}")]
    MaxIterationsExceeded { max: u32, current: u32 },

    #[error("tool {tool_name} failed (call {tool_call_id}): {reason}")]
    ToolFailed {
        tool_call_id: String,
        tool_name: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err: Error = ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Llm);
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn max_iterations_mentions_limit() {
        let err = Error::Llm(LlmError::MaxIterationsExceeded { max: 3, current: 4 });
        let msg = err.message();
        assert!(msg.contains("max iterations (3)"));
        assert!(msg.contains("iteration 4"));
    }

    #[test]
    fn hook_error_names_hook() {
        let err = Error::hook("before_call", "denied");
        assert_eq!(err.kind(), ErrorKind::Hook);
        assert_eq!(err.message(), "Hook error in before_call: denied");
    }

    #[test]
    fn budget_error_kind() {
        let err = Error::Budget {
            budget: 100,
            used: 150,
        };
        assert_eq!(err.kind(), ErrorKind::Budget);
        assert!(err.message().contains("150"));
        assert_eq!(ErrorKind::Budget.to_string(), "budget");
    }
}
