//! Tool result processors.
//!
//! Processors shrink success payloads before they are folded into the
//! context. Failures pass through untouched so the model always sees the
//! full reason a tool failed.

use ostinato_core::tool::ToolResult;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Appended to strings cut by [`ResultProcessor::Truncate`].
pub const TRUNCATION_MARKER: &str = "... [truncated]";

/// Number of keys listed in a summary of a map payload.
const SUMMARY_SAMPLE_KEYS: usize = 5;

/// Which items [`ResultProcessor::Sample`] keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleStrategy {
    #[default]
    First,
    Last,
    /// Evenly spaced items across the whole list
    Spread,
}

/// One payload transformation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResultProcessor {
    /// Cut strings to `max_size` characters, lists to `max_size` items
    /// and maps to `max_size` keys, recursively.
    Truncate { max_size: usize },
    /// Replace payloads whose JSON form is longer than `threshold`
    /// bytes with a description of their shape.
    Summarize { threshold: usize },
    /// Keep `size` items of a list payload.
    Sample {
        size: usize,
        #[serde(default)]
        strategy: SampleStrategy,
    },
}

impl ResultProcessor {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Truncate { .. } => "truncate",
            Self::Summarize { .. } => "summarize",
            Self::Sample { .. } => "sample",
        }
    }

    pub fn apply(&self, payload: Value) -> Value {
        match *self {
            Self::Truncate { max_size } => truncate_value(payload, max_size),
            Self::Summarize { threshold } => summarize_value(payload, threshold),
            Self::Sample { size, strategy } => sample_value(payload, size, strategy),
        }
    }
}

/// Run every processor, in order, over each success payload.
pub fn process_results(results: &[ToolResult], processors: &[ResultProcessor]) -> Vec<ToolResult> {
    results
        .iter()
        .map(|result| match &result.outcome {
            Ok(payload) => ToolResult::ok(
                result.tool_call_id.clone(),
                processors
                    .iter()
                    .fold(payload.clone(), |payload, processor| processor.apply(payload)),
            ),
            Err(_) => result.clone(),
        })
        .collect()
}

pub fn truncate_value(value: Value, max_size: usize) -> Value {
    match value {
        Value::String(s) => Value::String(truncate_str(s, max_size)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .take(max_size)
                .map(|item| truncate_value(item, max_size))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .take(max_size)
                .map(|(k, v)| (k, truncate_value(v, max_size)))
                .collect(),
        ),
        other => other,
    }
}

fn truncate_str(s: String, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => {
            let mut out = s[..cut].to_string();
            out.push_str(TRUNCATION_MARKER);
            out
        }
        None => s,
    }
}

pub fn summarize_value(value: Value, threshold: usize) -> Value {
    let size = value.to_string().len();
    if size <= threshold {
        return value;
    }
    let (kind, count, sample_keys) = match &value {
        Value::Object(map) => (
            "map",
            map.len(),
            map.keys().take(SUMMARY_SAMPLE_KEYS).cloned().collect::<Vec<_>>(),
        ),
        Value::Array(items) => ("list", items.len(), Vec::new()),
        Value::String(s) => ("string", s.chars().count(), Vec::new()),
        Value::Number(_) => ("number", 1, Vec::new()),
        Value::Bool(_) => ("boolean", 1, Vec::new()),
        Value::Null => ("null", 0, Vec::new()),
    };
    let mut summary = Map::new();
    summary.insert("type".into(), json!(kind));
    summary.insert("size".into(), json!(size));
    summary.insert("count".into(), json!(count));
    summary.insert("sample_keys".into(), json!(sample_keys));
    json!({ "summary": summary })
}

pub fn sample_value(value: Value, size: usize, strategy: SampleStrategy) -> Value {
    let Value::Array(items) = value else {
        return value;
    };
    let len = items.len();
    if len <= size {
        return Value::Array(items);
    }
    let kept = match strategy {
        SampleStrategy::First => items.into_iter().take(size).collect(),
        SampleStrategy::Last => items.into_iter().skip(len - size).collect(),
        SampleStrategy::Spread => (0..size).map(|i| items[i * len / size].clone()).collect(),
    };
    Value::Array(kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_strings_by_chars() {
        let out = truncate_value(json!("héllo world"), 5);
        assert_eq!(out, json!(format!("héllo{TRUNCATION_MARKER}")));
        assert_eq!(truncate_value(json!("short"), 5), json!("short"));
    }

    #[test]
    fn truncate_nested_collections() {
        let payload = json!({
            "a": [1, 2, 3, 4],
            "b": "abcdefgh",
            "c": 1,
            "d": 2,
        });
        let out = truncate_value(payload, 3);
        let map = out.as_object().unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(map["a"], json!([1, 2, 3]));
        assert_eq!(map["b"], json!(format!("abc{TRUNCATION_MARKER}")));
    }

    #[test]
    fn summarize_large_map() {
        let payload: Map<String, Value> = (0..50).map(|i| (format!("key{i:02}"), json!(i))).collect();
        let out = summarize_value(Value::Object(payload), 20);
        let summary = &out["summary"];
        assert_eq!(summary["type"], "map");
        assert_eq!(summary["count"], 50);
        assert_eq!(summary["sample_keys"].as_array().unwrap().len(), 5);
        assert!(summary["size"].as_u64().unwrap() > 20);
    }

    #[test]
    fn summarize_leaves_small_payloads() {
        assert_eq!(summarize_value(json!([1, 2]), 100), json!([1, 2]));
    }

    #[test]
    fn sample_strategies() {
        let list = json!([0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(sample_value(list.clone(), 3, SampleStrategy::First), json!([0, 1, 2]));
        assert_eq!(sample_value(list.clone(), 3, SampleStrategy::Last), json!([7, 8, 9]));
        assert_eq!(sample_value(list.clone(), 5, SampleStrategy::Spread), json!([0, 2, 4, 6, 8]));
        assert_eq!(sample_value(json!({"a": 1}), 1, SampleStrategy::First), json!({"a": 1}));
    }

    #[test]
    fn failures_are_not_processed() {
        let long = "x".repeat(100);
        let results = vec![
            ToolResult::ok("a", json!(long.clone())),
            ToolResult::error("b", long.clone()),
        ];
        let out = process_results(&results, &[ResultProcessor::Truncate { max_size: 10 }]);
        assert_eq!(out[0].outcome.as_ref().unwrap().as_str().unwrap().len(), 10 + TRUNCATION_MARKER.len());
        assert_eq!(out[1], results[1]);
    }

    #[test]
    fn processors_apply_in_order() {
        let list: Vec<_> = (0..100).collect();
        let results = vec![ToolResult::ok("a", json!(list))];
        let processors = [
            ResultProcessor::Truncate { max_size: 50 },
            ResultProcessor::Sample { size: 2, strategy: SampleStrategy::Last },
        ];
        let out = process_results(&results, &processors);
        assert_eq!(out[0].outcome, Ok(json!([48, 49])));
    }
}
