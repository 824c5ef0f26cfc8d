pub mod call;
pub mod config_cmd;
pub mod transcript;

use anyhow::Context as _;
use ostinato_config::AppConfig;
use std::path::{Path, PathBuf};

pub fn default_config_path() -> PathBuf {
    AppConfig::config_dir().join("config.toml")
}

/// Load `path` (defaults when missing), apply environment overrides and
/// validate the result.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    load_config_with(path, |key| std::env::var(key).ok())
}

pub fn load_config_with(path: &Path, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from(path).with_context(|| format!("loading {}", path.display()))?;
    config.apply_env_overrides(lookup)?;
    config.validate()?;
    Ok(config)
}
