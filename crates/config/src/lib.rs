//! Configuration loading, validation, and management for Ostinato.
//!
//! Loads loop defaults from `~/.ostinato/config.toml` with environment
//! variable overrides. Validates all settings at load time.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ostinato/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Agent loop defaults
    #[serde(default)]
    pub agent: AgentDefaults,

    /// Token budget and warning thresholds
    #[serde(default)]
    pub token_limits: TokenLimitsConfig,

    /// Tool result shrinking and history compaction
    #[serde(default)]
    pub progressive_disclosure: DisclosureConfig,

    /// Telemetry event emission
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// What the loop does when a tool (or a provider call) fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolErrorPolicy {
    /// Report the failure to the model and keep going
    #[default]
    Continue,
    /// Stop the call with an error
    Halt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefaults {
    /// Default client spec ("provider:model")
    #[serde(default = "default_client")]
    pub client: String,

    /// Maximum provider round trips per call
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    #[serde(default)]
    pub tool_error_policy: ToolErrorPolicy,
}

fn default_client() -> String {
    "echo".into()
}
fn default_max_iterations() -> u32 {
    10
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            client: default_client(),
            max_iterations: default_max_iterations(),
            tool_error_policy: ToolErrorPolicy::default(),
        }
    }
}

/// What happens once the token budget is reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetStrategy {
    /// Emit a warning event and keep going
    #[default]
    Warn,
    /// Refuse to start another iteration
    Halt,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenLimitsConfig {
    /// Cumulative token budget per call (absent = unlimited)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<u64>,

    /// Fraction of the budget at which a warning is emitted
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    #[serde(default)]
    pub strategy: BudgetStrategy,
}

fn default_warning_threshold() -> f64 {
    0.8
}

impl Default for TokenLimitsConfig {
    fn default() -> Self {
        Self {
            budget: None,
            warning_threshold: default_warning_threshold(),
            strategy: BudgetStrategy::default(),
        }
    }
}

/// Progressive disclosure settings. Every knob is optional; unset means off.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisclosureConfig {
    /// Max string length / list length / map size for tool payloads
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truncate: Option<usize>,

    /// Serialized size above which a payload is replaced by a summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarize_threshold: Option<usize>,

    /// Number of list items kept when sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<usize>,

    /// Number of most recent iterations kept in context
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sliding_window: Option<usize>,

    /// Estimated context size to compact down to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
}

impl DisclosureConfig {
    pub fn is_enabled(&self) -> bool {
        self.truncate.is_some()
            || self.summarize_threshold.is_some()
            || self.sample.is_some()
            || self.sliding_window.is_some()
            || self.token_budget.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Whether telemetry events are emitted at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Mirror every event into the log at debug level
    #[serde(default)]
    pub log_events: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            log_events: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ostinato/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `OSTINATO_CLIENT`
    /// - `OSTINATO_MAX_ITERATIONS`
    /// - `OSTINATO_LOG`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply overrides read through `lookup` (the environment in production).
    pub fn apply_env_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(client) = lookup("OSTINATO_CLIENT") {
            self.agent.client = client;
        }
        if let Some(raw) = lookup("OSTINATO_MAX_ITERATIONS") {
            self.agent.max_iterations = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "OSTINATO_MAX_ITERATIONS must be a positive integer, got '{raw}'"
                ))
            })?;
        }
        if let Some(level) = lookup("OSTINATO_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ostinato")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent.client.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "agent.client must not be empty".into(),
            ));
        }

        if self.agent.max_iterations == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_iterations must be at least 1".into(),
            ));
        }

        let threshold = self.token_limits.warning_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::ValidationError(
                "token_limits.warning_threshold must be in (0.0, 1.0]".into(),
            ));
        }

        if self.token_limits.budget == Some(0) {
            return Err(ConfigError::ValidationError(
                "token_limits.budget must be > 0 when set".into(),
            ));
        }

        let pd = &self.progressive_disclosure;
        for (name, value) in [
            ("truncate", pd.truncate),
            ("summarize_threshold", pd.summarize_threshold),
            ("sample", pd.sample),
            ("sliding_window", pd.sliding_window),
        ] {
            if value == Some(0) {
                return Err(ConfigError::ValidationError(format!(
                    "progressive_disclosure.{name} must be > 0 when set"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `config init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

fn dirs_home() -> PathBuf {
    #[cfg(windows)]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }
    #[cfg(not(windows))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },
    #[error("Failed to parse config file {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}
