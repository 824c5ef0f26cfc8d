//! `ostinato call` — Single-call mode against the configured client.

use ostinato_agent::AgentBuilder;
use ostinato_config::AppConfig;
use serde_json::Value;
use tracing::info;

pub async fn run(config: &AppConfig, input: &str, template: Option<String>, json: bool) -> anyhow::Result<()> {
    let mut builder = AgentBuilder::from_config("cli", config);
    if let Some(template) = template {
        builder = builder.template(template);
    }
    let agent = builder.build()?;

    let result = agent.call(parse_input(input)).await?;
    info!(
        client = %agent.client(),
        iterations = result.iterations,
        total_tokens = result.usage.total_tokens,
        "Call finished"
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match &result.output {
            Value::String(text) => println!("{text}"),
            other => println!("{}", serde_json::to_string_pretty(other)?),
        }
    }
    Ok(())
}

/// JSON when it parses, otherwise the raw text.
fn parse_input(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
