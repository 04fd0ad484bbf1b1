//! Structured data (JSON/YAML): condensed into a shape description.

use serde_json::Value;
use tracing::debug;

use super::{split_lines, Boundary, LanguageStrategy};
use crate::condenser::CondensingLevel;
use crate::priority::PriorityLevel;

const MAX_KEYS: usize = 5;
const MAX_SCALAR_CHARS: usize = 20;

pub(crate) struct DataStrategy;

fn parse_data(content: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(content) {
        Ok(value) => return Some(value),
        Err(e) => debug!(error = %e, "not JSON; trying YAML"),
    }
    match serde_yaml::from_str::<Value>(content) {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(error = %e, "not YAML either; summarising lines");
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Object(_) => "object",
        Value::Array(_) => "array",
        Value::String(_) => "string",
        Value::Number(_) => "number",
        Value::Bool(_) => "bool",
        Value::Null => "null",
    }
}

fn describe_scalar(value: &Value) -> String {
    // `Value`'s Display is its JSON literal: strings quoted, numbers bare.
    let literal = value.to_string();
    if literal.chars().count() > MAX_SCALAR_CHARS {
        let head: String = literal.chars().take(MAX_SCALAR_CHARS).collect();
        format!("{}({}...)", type_name(value), head)
    } else {
        literal
    }
}

/// Describe the shape of `value` down to `max_depth` levels.
fn describe(value: &Value, max_depth: usize, depth: usize) -> String {
    if depth >= max_depth {
        return format!("<{}>", type_name(value));
    }

    match value {
        Value::Object(map) if map.is_empty() => "{}".to_string(),
        Value::Object(map) => {
            let mut items: Vec<String> = map
                .iter()
                .take(MAX_KEYS)
                .map(|(key, v)| format!("\"{}\": {}", key, describe(v, max_depth, depth + 1)))
                .collect();
            if map.len() > MAX_KEYS {
                items.push("...".to_string());
            }
            format!("{{{}}}", items.join(", "))
        }
        Value::Array(items) => match items.as_slice() {
            [] => "[]".to_string(),
            [only] => format!("[{}]", describe(only, max_depth, depth + 1)),
            [first, ..] => format!(
                "[{}, ...] (length: {})",
                describe(first, max_depth, depth + 1),
                items.len()
            ),
        },
        scalar => describe_scalar(scalar),
    }
}

fn summarize_lines(content: &str) -> String {
    let lines = split_lines(content);
    if lines.len() <= 20 {
        return content.to_string();
    }
    let mut kept: Vec<&str> = lines[..10].to_vec();
    kept.push("# ... truncated ...");
    kept.extend_from_slice(&lines[lines.len() - 5..]);
    kept.join("\n")
}

impl LanguageStrategy for DataStrategy {
    fn condense(&self, content: &str, level: CondensingLevel, _priority: PriorityLevel) -> String {
        let max_depth = match level {
            // Data files are already dense.
            CondensingLevel::None | CondensingLevel::Light => return content.to_string(),
            CondensingLevel::Moderate => 2,
            CondensingLevel::Heavy | CondensingLevel::Maximum => 1,
        };

        match parse_data(content) {
            Some(value) => describe(&value, max_depth, 0),
            None => summarize_lines(content),
        }
    }

    fn boundaries(&self, _content: &str) -> Option<Vec<Boundary>> {
        None
    }
}
