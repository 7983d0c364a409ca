//! Conversion of tools into model-facing definitions, lookup and merging.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::tool::Tool;

/// Function-tool description handed to the language model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema of the input object.
    pub input_schema: serde_json::Value,
}

impl ToolDefinition {
    pub fn from_tool(tool: &dyn Tool) -> Self {
        Self {
            name: tool.name().to_string(),
            description: tool.description().to_string(),
            input_schema: tool.parameters().schema.clone(),
        }
    }
}

/// Anything addressable by tool name.
pub trait NamedTool {
    fn tool_name(&self) -> &str;
}

impl NamedTool for ToolDefinition {
    fn tool_name(&self) -> &str {
        &self.name
    }
}

impl NamedTool for Arc<dyn Tool> {
    fn tool_name(&self) -> &str {
        self.name()
    }
}

/// Describe each tool for the model, preserving order.
pub fn convert_tools(tools: &[Arc<dyn Tool>]) -> Vec<ToolDefinition> {
    tools
        .iter()
        .map(|tool| ToolDefinition::from_tool(tool.as_ref()))
        .collect()
}

/// First tool whose name matches exactly.
pub fn get_tool<'a, T: NamedTool>(tools: &'a [T], name: &str) -> Option<&'a T> {
    tools.iter().find(|tool| tool.tool_name() == name)
}

/// Merge two tool lists by name.
///
/// Entries of `overrides` replace same-named entries of `base` in place; the
/// rest of `overrides` is appended in its own order.
pub fn merge_tools<T: NamedTool>(base: Vec<T>, overrides: Vec<T>) -> Vec<T> {
    let mut pending: HashMap<String, T> = HashMap::new();
    let mut order = Vec::new();
    for tool in overrides {
        let name = tool.tool_name().to_string();
        if !pending.contains_key(&name) {
            order.push(name.clone());
        }
        pending.insert(name, tool);
    }

    let mut merged = Vec::with_capacity(base.len() + pending.len());
    for tool in base {
        match pending.remove(tool.tool_name()) {
            Some(replacement) => merged.push(replacement),
            None => merged.push(tool),
        }
    }
    merged.extend(order.into_iter().filter_map(|name| pending.remove(&name)));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{AgentTool, ToolParameters, ToolResult};
    use pretty_assertions::assert_eq;

    fn def(name: &str, description: &str) -> ToolDefinition {
        ToolDefinition {
            name: name.into(),
            description: description.into(),
            input_schema: serde_json::json!({"type": "object"}),
        }
    }

    fn echo(name: &str) -> Arc<dyn Tool> {
        Arc::new(AgentTool::new(
            name,
            format!("{name} tool"),
            ToolParameters::object().string("q", "query", true).build(),
            |_args, _info| async { Ok(ToolResult::text("ok")) },
        ))
    }

    #[test]
    fn convert_keeps_order_and_schema() {
        let defs = convert_tools(&[echo("search"), echo("read")]);
        let names: Vec<_> = defs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["search", "read"]);
        assert_eq!(defs[0].description, "search tool");
        assert_eq!(defs[0].input_schema["required"], serde_json::json!(["q"]));
        assert!(convert_tools(&[]).is_empty());
    }

    #[test]
    fn get_tool_matches_exactly() {
        let tools = vec![echo("search"), echo("search"), echo("read")];
        assert!(get_tool(&tools, "read").is_some());
        assert!(get_tool(&tools, "Read").is_none());
        assert!(get_tool(&tools, "").is_none());
        assert!(get_tool::<Arc<dyn Tool>>(&[], "read").is_none());
        assert!(Arc::ptr_eq(get_tool(&tools, "search").unwrap(), &tools[0]));
    }

    #[test]
    fn merge_replaces_in_place_and_appends() {
        let merged = merge_tools(
            vec![def("a", "old"), def("b", "b")],
            vec![def("c", "c"), def("a", "new")],
        );
        let summary: Vec<_> = merged
            .iter()
            .map(|d| (d.name.as_str(), d.description.as_str()))
            .collect();
        assert_eq!(summary, vec![("a", "new"), ("b", "b"), ("c", "c")]);
    }
}
