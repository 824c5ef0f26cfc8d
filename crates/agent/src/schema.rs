//! Output schemas: what shape an agent's answer must take.
//!
//! A schema is validated once per call, advertised to the provider as a
//! JSON schema plus formatting instructions, and used to coerce the
//! final response (or each stream chunk) into a value.

use ostinato_core::error::{Error, Result};
use ostinato_core::provider::StreamChunk;
use ostinato_core::tool::ParamType;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};
use std::collections::HashSet;

/// One field of an object schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl FieldSpec {
    pub fn required(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: String::new(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind)
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The expected output of an agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutputSchema {
    /// Free text, returned as a JSON string
    #[default]
    Text,
    /// Any JSON value
    Json,
    /// A JSON object with declared fields, coerced field by field
    Object { fields: Vec<FieldSpec> },
}

impl OutputSchema {
    pub fn object(fields: Vec<FieldSpec>) -> Self {
        Self::Object { fields }
    }

    /// Check the schema itself is usable.
    pub fn validate(&self) -> Result<()> {
        let Self::Object { fields } = self else {
            return Ok(());
        };
        if fields.is_empty() {
            return Err(Error::Schema("object schema declares no fields".into()));
        }
        let mut seen = HashSet::new();
        for field in fields {
            let name = field.name.trim_start_matches(':');
            if name.is_empty() {
                return Err(Error::Schema("field with an empty name".into()));
            }
            if !seen.insert(name) {
                return Err(Error::Schema(format!("duplicate field `{name}`")));
            }
        }
        Ok(())
    }

    /// JSON schema sent to the provider, if the output is structured.
    pub fn json_schema(&self) -> Option<Value> {
        let Self::Object { fields } = self else {
            return None;
        };
        let mut properties = Map::new();
        let mut required = Vec::new();
        for field in fields {
            let mut prop = Map::new();
            if let Some(t) = field.kind.json_type() {
                prop.insert("type".into(), json!(t));
            }
            if !field.description.is_empty() {
                prop.insert("description".into(), json!(field.description));
            }
            properties.insert(field.name.clone(), Value::Object(prop));
            if field.required {
                required.push(field.name.clone());
            }
        }
        Some(json!({
            "type": "object",
            "properties": properties,
            "required": required,
        }))
    }

    /// The `output_format` hint offered to prompt templates.
    pub fn format_instructions(&self) -> Option<String> {
        match self {
            Self::Text => None,
            Self::Json => Some("Respond with a single JSON value and nothing else.".into()),
            Self::Object { fields } => {
                let mut text = String::from("Respond with a JSON object with these fields:");
                for field in fields {
                    let kind = field.kind.json_type().unwrap_or("any");
                    let need = if field.required { "required" } else { "optional" };
                    text.push_str(&format!("\n- {} ({kind}, {need})", field.name));
                    if !field.description.is_empty() {
                        text.push_str(": ");
                        text.push_str(&field.description);
                    }
                }
                Some(text)
            }
        }
    }

    /// Parse a final response. `structured` is the provider's own
    /// structured body, preferred over the text when present.
    pub fn parse(&self, content: &str, structured: Option<&Value>) -> Result<Value> {
        match self {
            Self::Text => Ok(Value::String(content.to_string())),
            Self::Json => match structured {
                Some(value) => Ok(value.clone()),
                None => parse_json_text(content),
            },
            Self::Object { .. } => match structured {
                Some(value) => self.parse_value(value),
                None => self.parse_value(&parse_json_text(content)?),
            },
        }
    }

    /// Coerce an already-decoded value. Object keys may be spelled
    /// `name` or `:name`; undeclared keys are dropped.
    pub fn parse_value(&self, raw: &Value) -> Result<Value> {
        let Self::Object { fields } = self else {
            return Ok(raw.clone());
        };
        let Value::Object(map) = raw else {
            return Err(Error::Parse(format!("expected a JSON object, got {}", type_name(raw))));
        };

        let mut out = Map::new();
        for field in fields {
            let name = field.name.trim_start_matches(':');
            let value = map.get(name).or_else(|| map.get(&format!(":{name}")));
            match value {
                Some(Value::Null) | None if field.required => {
                    return Err(Error::Parse(format!("missing required field `{name}`")));
                }
                Some(Value::Null) | None => {}
                Some(value) => {
                    let coerced = coerce(value, field.kind).ok_or_else(|| {
                        Error::Parse(format!(
                            "field `{name}`: cannot convert {} to {}",
                            type_name(value),
                            field.kind.json_type().unwrap_or("any")
                        ))
                    })?;
                    out.insert(name.to_string(), coerced);
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// Convert one stream chunk on its own.
    pub fn parse_chunk(&self, chunk: &StreamChunk) -> Result<Value> {
        match self {
            Self::Text => Ok(Value::String(chunk.content.clone().unwrap_or_default())),
            _ => self.parse(chunk.content.as_deref().unwrap_or_default(), chunk.data.as_ref()),
        }
    }
}

/// Decode JSON text, tolerating a surrounding markdown code fence.
pub fn parse_json_text(text: &str) -> Result<Value> {
    let cleaned = text.trim();
    let cleaned = cleaned.strip_prefix("```json").unwrap_or(cleaned);
    let cleaned = cleaned.strip_prefix("```").unwrap_or(cleaned);
    let cleaned = cleaned.strip_suffix("```").unwrap_or(cleaned);
    serde_json::from_str(cleaned.trim()).map_err(|e| Error::Parse(format!("response is not valid JSON: {e}")))
}

fn coerce(value: &Value, kind: ParamType) -> Option<Value> {
    match (kind, value) {
        (ParamType::Any, v) => Some(v.clone()),
        (ParamType::String, Value::String(_)) => Some(value.clone()),
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),
        (ParamType::Integer, Value::Number(n)) => match n.as_i64() {
            Some(i) => Some(json!(i)),
            None => n.as_f64().filter(|f| f.fract() == 0.0).map(|f| json!(f as i64)),
        },
        (ParamType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(|i| json!(i)),
        (ParamType::Number, Value::Number(_)) => Some(value.clone()),
        (ParamType::Number, Value::String(s)) => {
            s.trim().parse::<f64>().ok().and_then(Number::from_f64).map(Value::Number)
        }
        (ParamType::Boolean, Value::Bool(_)) => Some(value.clone()),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        (ParamType::Array, Value::Array(_)) | (ParamType::Object, Value::Object(_)) => Some(value.clone()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ostinato_core::error::ErrorKind;

    fn weather() -> OutputSchema {
        OutputSchema::object(vec![
            FieldSpec::required("city", ParamType::String).describe("City name"),
            FieldSpec::required("temp", ParamType::Integer),
            FieldSpec::optional("sunny", ParamType::Boolean),
        ])
    }

    #[test]
    fn validate_rejects_bad_object_schemas() {
        assert!(weather().validate().is_ok());
        assert!(OutputSchema::Text.validate().is_ok());
        let empty = OutputSchema::object(vec![]);
        assert_eq!(empty.validate().unwrap_err().kind(), ErrorKind::Schema);
        let dup = OutputSchema::object(vec![
            FieldSpec::required("a", ParamType::Any),
            FieldSpec::optional(":a", ParamType::Any),
        ]);
        assert!(dup.validate().is_err());
    }

    #[test]
    fn parses_fenced_json_with_coercion() {
        let text = "```json\n{\"city\": \"Oslo\", \"temp\": \"7\", \"sunny\": \"false\", \"extra\": 1}\n```";
        let value = weather().parse(text, None).unwrap();
        assert_eq!(value, json!({"city": "Oslo", "temp": 7, "sunny": false}));
    }

    #[test]
    fn accepts_symbolic_keys() {
        let value = weather().parse_value(&json!({":city": "Oslo", ":temp": 7.0})).unwrap();
        assert_eq!(value, json!({"city": "Oslo", "temp": 7}));
    }

    #[test]
    fn missing_or_invalid_fields_are_parse_errors() {
        let err = weather().parse_value(&json!({"city": "Oslo"})).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert!(err.message().contains("temp"));

        assert!(weather().parse_value(&json!({"city": "Oslo", "temp": "warm"})).is_err());
        assert!(weather().parse("not json", None).is_err());
        assert!(weather().parse_value(&json!([1])).is_err());
    }

    #[test]
    fn structured_body_wins_over_text() {
        let body = json!({"city": "Rome", "temp": 20});
        let value = weather().parse("ignored", Some(&body)).unwrap();
        assert_eq!(value["city"], "Rome");
        assert_eq!(OutputSchema::Json.parse("[1,2]", None).unwrap(), json!([1, 2]));
        assert_eq!(OutputSchema::Text.parse("hi", None).unwrap(), json!("hi"));
    }

    #[test]
    fn json_schema_and_instructions() {
        let schema = weather().json_schema().unwrap();
        assert_eq!(schema["required"], json!(["city", "temp"]));
        assert_eq!(schema["properties"]["temp"]["type"], "integer");
        let hint = weather().format_instructions().unwrap();
        assert!(hint.contains("- city (string, required): City name"));
        assert!(OutputSchema::Text.json_schema().is_none());
    }

    #[test]
    fn partial_chunks_fail_to_parse() {
        let chunk = StreamChunk {
            content: Some("{\"city\": \"Os".into()),
            ..StreamChunk::default()
        };
        assert!(weather().parse_chunk(&chunk).is_err());
        assert_eq!(OutputSchema::Text.parse_chunk(&chunk).unwrap(), json!("{\"city\": \"Os"));
    }
}
