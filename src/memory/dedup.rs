//! Removal of repeated tool calls within one model response.

use std::collections::HashSet;

use serde_json::Value;

use crate::llm::ResponsePart;

/// Drop tool calls that repeat an earlier call's name and input.
///
/// Inputs are compared as canonical JSON, so key order does not matter.
/// Text parts and first occurrences keep their positions; responses with at
/// most one tool call are returned as they are.
pub fn remove_duplicate_tool_use(parts: Vec<ResponsePart>) -> Vec<ResponsePart> {
    let tool_calls = parts
        .iter()
        .filter(|part| matches!(part, ResponsePart::ToolCall(_)))
        .count();
    if parts.len() <= 1 || tool_calls <= 1 {
        return parts;
    }

    let mut seen = HashSet::new();
    parts
        .into_iter()
        .filter(|part| match part {
            ResponsePart::ToolCall(call) => {
                let key = format!("{}\u{0}{}", call.name, canonical_json(&call.arguments_value()));
                seen.insert(key)
            }
            ResponsePart::Text(_) => true,
        })
        .collect()
}

/// Serialize with object keys sorted at every depth.
fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|key| format!("{}:{}", Value::String(key.clone()), canonical_json(&map[key])))
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}
