//! Tool definitions, calls and results.
//!
//! Tools are what give the agent the ability to act mid-conversation.
//! A [`ToolDefinition`] is static configuration: a name, a description,
//! an ordered parameter list, and exactly one handler (a callable
//! function or a reference to an externally dispatched action).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::provider::ToolSchema;

/// A request, emitted by the provider, to invoke a named tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Correlation id (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Decoded arguments
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// JSON type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl ParamType {
    pub fn json_type(&self) -> Option<&'static str> {
        match self {
            Self::String => Some("string"),
            Self::Integer => Some("integer"),
            Self::Number => Some("number"),
            Self::Boolean => Some("boolean"),
            Self::Array => Some("array"),
            Self::Object => Some("object"),
            Self::Any => None,
        }
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

impl ToolParameter {
    pub fn required(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        }
    }

    pub fn optional(name: impl Into<String>, kind: ParamType, description: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name, kind, description)
        }
    }
}

/// Who is calling, passed to every tool invocation.
///
/// The agent, domain, actor and tenant are the minimum contract an
/// external action dispatcher may rely on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolContext {
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<Value>,
}

/// Why a tool call failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolFailure {
    Message(String),
    Structured(Value),
}

impl ToolFailure {
    /// The failure rendered as text; structured reasons are JSON-encoded.
    pub fn reason(&self) -> String {
        match self {
            Self::Message(m) => m.clone(),
            Self::Structured(v) => serde_json::to_string(v).unwrap_or_else(|_| v.to_string()),
        }
    }
}

impl std::fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.reason())
    }
}

impl From<String> for ToolFailure {
    fn from(s: String) -> Self {
        Self::Message(s)
    }
}

impl From<&str> for ToolFailure {
    fn from(s: &str) -> Self {
        Self::Message(s.to_string())
    }
}

/// The outcome of one tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The call id this result is for
    pub tool_call_id: String,

    /// Success payload or failure reason
    pub outcome: std::result::Result<Value, ToolFailure>,
}

impl ToolResult {
    pub fn ok(tool_call_id: impl Into<String>, payload: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: Ok(payload),
        }
    }

    pub fn error(tool_call_id: impl Into<String>, failure: impl Into<ToolFailure>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            outcome: Err(failure.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.outcome.is_err()
    }

    /// The provider-consumable JSON form of the outcome.
    ///
    /// Object payloads pass through, other payloads are wrapped as
    /// `{"result": ...}`, failures become `{"error": "<reason>"}`.
    pub fn to_json(&self) -> Value {
        match &self.outcome {
            Ok(Value::Object(map)) => Value::Object(map.clone()),
            Ok(other) => serde_json::json!({ "result": other }),
            Err(failure) => serde_json::json!({ "error": failure.reason() }),
        }
    }
}

/// A plain-function tool implementation.
#[async_trait]
pub trait ToolFunction: Send + Sync {
    async fn invoke(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> std::result::Result<Value, ToolFailure>;
}

/// Reference to an externally dispatchable action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRef {
    pub resource: String,
    pub action: String,
}

impl ActionRef {
    pub fn new(resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            action: action.into(),
        }
    }
}

impl std::fmt::Display for ActionRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource, self.action)
    }
}

/// Executes action-backed tools on behalf of the loop.
#[async_trait]
pub trait ActionDispatcher: Send + Sync {
    async fn dispatch(
        &self,
        action: &ActionRef,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> std::result::Result<Value, ToolFailure>;
}

/// How a tool is executed.
#[derive(Clone)]
pub enum ToolHandler {
    Function(Arc<dyn ToolFunction>),
    Action(ActionRef),
}

impl std::fmt::Debug for ToolHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Function(_) => f.write_str("Function(..)"),
            Self::Action(action) => write!(f, "Action({action})"),
        }
    }
}

/// Static description of a tool. Immutable once an agent is built.
#[derive(Debug, Clone)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ToolParameter>,
    pub handler: ToolHandler,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<ToolParameter>,
        handler: ToolHandler,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler,
        }
    }

    /// Names of required parameters absent from `arguments`, in declaration order.
    pub fn missing_parameters(&self, arguments: &Map<String, Value>) -> Vec<String> {
        self.parameters
            .iter()
            .filter(|p| p.required && !arguments.contains_key(&p.name))
            .map(|p| p.name.clone())
            .collect()
    }

    /// Convert this tool into the schema sent to the LLM.
    pub fn to_schema(&self) -> ToolSchema {
        let mut properties = Map::new();
        for param in &self.parameters {
            let mut prop = Map::new();
            if let Some(t) = param.kind.json_type() {
                prop.insert("type".into(), Value::String(t.into()));
            }
            if !param.description.is_empty() {
                prop.insert("description".into(), Value::String(param.description.clone()));
            }
            properties.insert(param.name.clone(), Value::Object(prop));
        }
        let required: Vec<Value> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| Value::String(p.name.clone()))
            .collect();

        ToolSchema {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": properties,
                "required": required,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup_tool() -> ToolDefinition {
        ToolDefinition::new(
            "lookup",
            "Look up a record",
            vec![
                ToolParameter::required("id", ParamType::String, "Record id"),
                ToolParameter::optional("verbose", ParamType::Boolean, ""),
            ],
            ToolHandler::Action(ActionRef::new("record", "read")),
        )
    }

    #[test]
    fn missing_parameters_lists_required_only() {
        let tool = lookup_tool();
        assert_eq!(tool.missing_parameters(&Map::new()), vec!["id".to_string()]);

        let mut args = Map::new();
        args.insert("id".into(), json!("42"));
        assert!(tool.missing_parameters(&args).is_empty());
    }

    #[test]
    fn schema_has_properties_and_required() {
        let schema = lookup_tool().to_schema();
        assert_eq!(schema.name, "lookup");
        assert_eq!(schema.parameters["properties"]["id"]["type"], "string");
        assert_eq!(schema.parameters["properties"]["verbose"]["type"], "boolean");
        assert_eq!(schema.parameters["required"], json!(["id"]));
    }

    #[test]
    fn result_json_wraps_non_map_payloads() {
        assert_eq!(ToolResult::ok("a", json!(42)).to_json(), json!({"result": 42}));
        assert_eq!(
            ToolResult::ok("a", json!({"x": 1})).to_json(),
            json!({"x": 1})
        );
    }

    #[test]
    fn result_json_stringifies_structured_errors() {
        let result = ToolResult::error("a", ToolFailure::Structured(json!({"code": 7})));
        assert_eq!(result.to_json(), json!({"error": "{\"code\":7}"}));
        assert!(result.is_error());
    }
}
