//! Response-shape adapters.
//!
//! Providers answer in different native shapes. Everything the loop
//! reads goes through [`extract`], which maps each shape onto one
//! normalized `(content, tool_calls)` pair:
//!
//! - already-normalized [`ResponseOutput::Message`]
//! - tagged variants ([`TaggedPart`]), spelled `tool_name`/`tool_arguments`
//!   or `name`/`arguments`
//! - raw JSON bodies: OpenAI-style `choices[0].message`, Anthropic-style
//!   content blocks, a flat `{content, tool_calls}` object, or a list of
//!   tagged parts
//!
//! Any other JSON body is a structured final answer.

use ostinato_core::provider::{ProviderResponse, ResponseOutput, TaggedPart};
use ostinato_core::tool::ToolCall;
use ostinato_core::usage::TokenUsage;
use serde_json::{Map, Value};

/// The normalized view of one provider response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extracted {
    /// Free text; empty when the provider produced none.
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    /// A structured body that carried neither text nor tool calls.
    pub structured: Option<Value>,
}

impl Extracted {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A fresh tool-call id for providers that omit one.
pub fn synthesize_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

/// Normalize any response shape.
pub fn extract(output: &ResponseOutput) -> Extracted {
    match output {
        ResponseOutput::Message { content, tool_calls } => Extracted {
            content: content.clone().unwrap_or_default(),
            tool_calls: tool_calls.iter().cloned().map(with_id).collect(),
            structured: None,
        },
        ResponseOutput::Tagged { parts } => from_tagged(parts),
        ResponseOutput::Json { body } => from_json(body),
    }
}

/// Usage reported by a response, falling back to a `usage` object in a
/// raw JSON body.
pub fn usage_of(response: &ProviderResponse) -> Option<TokenUsage> {
    if response.usage.is_some() {
        return response.usage;
    }
    match &response.output {
        ResponseOutput::Json { body } => body.get("usage").map(TokenUsage::from_value),
        _ => None,
    }
}

/// Decode tool-call arguments.
///
/// Objects pass through. Strings are parsed as JSON (the OpenAI
/// encoding). Null and blank strings are empty. Anything else is kept
/// under a `value` key.
pub fn decode_arguments(raw: &Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map.clone(),
        Value::Null => Map::new(),
        Value::String(s) if s.trim().is_empty() => Map::new(),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => map,
            Ok(other) => single("value", other),
            Err(_) => single("value", raw.clone()),
        },
        other => single("value", other.clone()),
    }
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

fn with_id(mut call: ToolCall) -> ToolCall {
    if call.id.is_empty() {
        call.id = synthesize_call_id();
    }
    call
}

fn id_or_new(id: Option<&str>) -> String {
    match id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => synthesize_call_id(),
    }
}

fn from_tagged(parts: &[TaggedPart]) -> Extracted {
    let mut out = Extracted::default();
    for part in parts {
        match part {
            TaggedPart::Text { text } => out.content.push_str(text),
            TaggedPart::ToolCall {
                id,
                tool_name,
                tool_arguments,
            } => out.tool_calls.push(ToolCall::new(
                id_or_new(id.as_deref()),
                tool_name.clone(),
                decode_arguments(tool_arguments),
            )),
        }
    }
    out
}

fn from_json(body: &Value) -> Extracted {
    if let Some(message) = body
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
    {
        return from_flat(message);
    }

    if let Some(blocks) = body.get("content").and_then(Value::as_array) {
        if !blocks.is_empty() && blocks.iter().all(is_typed_block) {
            return from_blocks(blocks);
        }
    }

    if body.get("tool_calls").is_some() {
        let flat = from_flat(body);
        if flat.has_tool_calls() || !flat.content.is_empty() {
            return flat;
        }
    }

    if let Some(items) = body.as_array() {
        if let Ok(parts) = serde_json::from_value::<Vec<TaggedPart>>(Value::Array(items.clone())) {
            return from_tagged(&parts);
        }
    }

    match body {
        Value::String(text) => Extracted {
            content: text.clone(),
            ..Default::default()
        },
        other => Extracted {
            content: other.to_string(),
            tool_calls: Vec::new(),
            structured: Some(other.clone()),
        },
    }
}

/// `{content, tool_calls: [{id, function: {name, arguments}}]}` or the
/// flattened `{id, name, arguments}` call form.
fn from_flat(message: &Value) -> Extracted {
    let content = match message.get("content") {
        Some(Value::String(s)) => s.clone(),
        _ => String::new(),
    };
    let tool_calls = message
        .get("tool_calls")
        .and_then(Value::as_array)
        .map(|calls| calls.iter().filter_map(flat_call).collect())
        .unwrap_or_default();
    Extracted {
        content,
        tool_calls,
        structured: None,
    }
}

fn flat_call(call: &Value) -> Option<ToolCall> {
    let function = call.get("function").unwrap_or(call);
    let name = function
        .get("name")
        .or_else(|| function.get("tool_name"))
        .and_then(Value::as_str)?;
    let arguments = function
        .get("arguments")
        .or_else(|| function.get("tool_arguments"))
        .unwrap_or(&Value::Null);
    Some(ToolCall::new(
        id_or_new(call.get("id").and_then(Value::as_str)),
        name,
        decode_arguments(arguments),
    ))
}

fn is_typed_block(block: &Value) -> bool {
    block.get("type").is_some_and(Value::is_string)
}

/// Anthropic-style `[{type: "text", text}, {type: "tool_use", id, name, input}]`.
fn from_blocks(blocks: &[Value]) -> Extracted {
    let mut out = Extracted::default();
    for block in blocks {
        match block.get("type").and_then(Value::as_str) {
            Some("text") => {
                if let Some(text) = block.get("text").and_then(Value::as_str) {
                    out.content.push_str(text);
                }
            }
            Some("tool_use") => {
                let Some(name) = block.get("name").and_then(Value::as_str) else {
                    continue;
                };
                out.tool_calls.push(ToolCall::new(
                    id_or_new(block.get("id").and_then(Value::as_str)),
                    name,
                    decode_arguments(block.get("input").unwrap_or(&Value::Null)),
                ));
            }
            _ => {}
        }
    }
    out
}
