//! `ostinato config` — Configuration management commands.

use super::load_config;
use anyhow::{Context as _, bail};
use ostinato_agent::{DisclosureSettings, LoopSettings, TokenLimits};
use ostinato_config::AppConfig;
use std::path::Path;

pub fn show(path: &Path) -> anyhow::Result<()> {
    let config = load_config(path)?;
    println!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

pub fn validate(path: &Path) -> anyhow::Result<()> {
    println!("Validating {}", path.display());
    if !path.exists() {
        println!("   (no file, checking defaults)");
    }

    let config = match load_config(path) {
        Ok(config) => config,
        Err(e) => {
            println!("   error: {e:#}");
            return Err(e);
        }
    };
    println!("   ok: config parsed and validated");

    let warnings = warnings(&config);
    for w in &warnings {
        println!("   warning: {w}");
    }

    let settings = LoopSettings::from_config(&config);
    let limits = TokenLimits::from_config(&config);
    let disclosure = DisclosureSettings::from_config(&config.progressive_disclosure);
    println!();
    println!("   Client:          {}", config.agent.client);
    println!("   Max iterations:  {}", settings.max_iterations);
    println!("   Tool errors:     {:?}", settings.tool_error_policy);
    match limits.budget {
        Some(budget) => println!("   Token budget:    {budget} ({:?})", limits.strategy),
        None => println!("   Token budget:    unlimited"),
    }
    let processors: Vec<_> = disclosure.processors().iter().map(|p| p.name()).collect();
    let compaction: Vec<_> = disclosure.compaction().iter().map(|s| s.name()).collect();
    println!("   Processors:      {}", list_or_none(&processors));
    println!("   Compaction:      {}", list_or_none(&compaction));
    Ok(())
}

/// Write the default config to `path`.
pub fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    std::fs::write(path, AppConfig::default_toml()).with_context(|| format!("writing {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// Settings that are valid but probably not intended.
fn warnings(config: &AppConfig) -> Vec<String> {
    let mut warnings = Vec::new();
    let disclosure = &config.progressive_disclosure;
    if config.agent.client.starts_with("echo") {
        warnings.push("client is the built-in echo provider".to_string());
    }
    if disclosure.sliding_window == Some(0) {
        warnings.push("progressive_disclosure.sliding_window = 0 still keeps one iteration".into());
    }
    if let Some(window) = disclosure.sliding_window {
        let max = config.agent.max_iterations;
        if window >= max as usize {
            warnings.push(format!(
                "sliding_window ({window}) never drops anything with max_iterations = {max}"
            ));
        }
    }
    if let (Some(context), Some(budget)) = (disclosure.token_budget, config.token_limits.budget) {
        if context > budget {
            warnings.push(format!("context token_budget ({context}) exceeds the call budget ({budget})"));
        }
    }
    warnings
}

fn list_or_none(items: &[&str]) -> String {
    if items.is_empty() {
        "none".into()
    } else {
        items.join(", ")
    }
}
