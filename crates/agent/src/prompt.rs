//! Prompt rendering.
//!
//! Templates use `{{ name }}` placeholders with dotted paths into the
//! call input (`{{ user.name }}`). The reserved `output_format`
//! variable carries the formatting hint derived from the output schema.

use regex_lite::Regex;
use serde_json::{Map, Value};

/// Placeholder syntax: `{{ path.to.value }}`.
const PLACEHOLDER: &str = r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}";

/// Values supplied by the agent rather than the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderConfig {
    /// How the model should format its answer
    pub output_format: Option<String>,
}

/// Renders a template against call variables.
pub trait PromptRenderer: Send + Sync {
    fn render(
        &self,
        template: &str,
        variables: &Map<String, Value>,
        config: &RenderConfig,
    ) -> Result<String, String>;
}

/// The built-in `{{ }}` renderer. Unknown placeholders are an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateRenderer;

impl PromptRenderer for TemplateRenderer {
    fn render(
        &self,
        template: &str,
        variables: &Map<String, Value>,
        config: &RenderConfig,
    ) -> Result<String, String> {
        let re = Regex::new(PLACEHOLDER).map_err(|e| e.to_string())?;

        let mut out = String::with_capacity(template.len());
        let mut last = 0;
        for caps in re.captures_iter(template) {
            let (Some(whole), Some(path)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            out.push_str(&template[last..whole.start()]);
            out.push_str(&resolve(path.as_str(), variables, config)?);
            last = whole.end();
        }
        out.push_str(&template[last..]);
        Ok(out)
    }
}

fn resolve(path: &str, variables: &Map<String, Value>, config: &RenderConfig) -> Result<String, String> {
    if path == "output_format" && !variables.contains_key(path) {
        return Ok(config.output_format.clone().unwrap_or_default());
    }

    let mut segments = path.split('.');
    let mut current = segments
        .next()
        .and_then(|head| variables.get(head))
        .ok_or_else(|| format!("undefined variable `{path}`"))?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
        .ok_or_else(|| format!("undefined variable `{path}`"))?;
    }

    Ok(match current {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Template variables for a call input: map inputs expose their keys,
/// anything else is bound to `input`.
pub fn variables_for(input: &Value) -> Map<String, Value> {
    match input {
        Value::Object(map) => map.clone(),
        other => {
            let mut map = Map::new();
            map.insert("input".into(), other.clone());
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn render(template: &str, input: Value) -> Result<String, String> {
        TemplateRenderer.render(template, &variables_for(&input), &RenderConfig::default())
    }

    #[test]
    fn substitutes_variables() {
        let out = render("Hello {{ name }}, you are {{age}}.", json!({"name": "Ada", "age": 36})).unwrap();
        assert_eq!(out, "Hello Ada, you are 36.");
    }

    #[test]
    fn dotted_paths_and_indexes() {
        let input = json!({"user": {"name": "Ada", "tags": ["x", "y"]}});
        assert_eq!(render("{{ user.name }}/{{ user.tags.1 }}", input).unwrap(), "Ada/y");
    }

    #[test]
    fn scalar_input_is_bound_to_input() {
        assert_eq!(render("Q: {{ input }}", json!("why?")).unwrap(), "Q: why?");
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let err = render("{{ missing }}", json!({})).unwrap_err();
        assert!(err.contains("missing"));
        assert!(render("{{ a.b }}", json!({"a": 1})).is_err());
    }

    #[test]
    fn output_format_comes_from_config() {
        let config = RenderConfig {
            output_format: Some("Respond in JSON.".into()),
        };
        let out = TemplateRenderer
            .render("Task. {{ output_format }}", &Map::new(), &config)
            .unwrap();
        assert_eq!(out, "Task. Respond in JSON.");
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        assert_eq!(render("plain {text}", json!({})).unwrap(), "plain {text}");
    }
}
