//! Node hints attached to a workflow agent.

use std::fmt::Write;

use serde::{Deserialize, Serialize};
use strum::Display;

/// Event source a watch node observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum WatchEvent {
    Dom,
    Gui,
    File,
}

/// A step hint inside an agent's task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WorkflowNode {
    Normal {
        text: String,
        /// Shared variable read by this step.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        /// Shared variable written by this step.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    ForEach {
        /// Variable name or literal list to iterate.
        items: String,
        nodes: Vec<WorkflowNode>,
    },
    Watch {
        event: WatchEvent,
        #[serde(rename = "loop", default)]
        loop_: bool,
        description: String,
        #[serde(default)]
        trigger_nodes: Vec<TriggerNode>,
    },
}

/// Nodes allowed inside a watch trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TriggerNode {
    Normal {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<String>,
    },
    ForEach {
        items: String,
        nodes: Vec<WorkflowNode>,
    },
}

impl WorkflowNode {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Normal {
            text: text.into(),
            input: None,
            output: None,
        }
    }

    pub fn uses_variables(&self) -> bool {
        match self {
            Self::Normal { input, output, .. } => input.is_some() || output.is_some(),
            Self::ForEach { nodes, .. } => nodes.iter().any(Self::uses_variables),
            Self::Watch { trigger_nodes, .. } => trigger_nodes.iter().any(|t| match t {
                TriggerNode::Normal { input, output, .. } => input.is_some() || output.is_some(),
                TriggerNode::ForEach { nodes, .. } => nodes.iter().any(Self::uses_variables),
            }),
        }
    }
}

/// Render nodes as the XML-like block agents see in their user prompt.
///
/// Normal nodes are numbered in document order; those ids are what the
/// `task_snapshot` tool reports as done.
pub fn render_nodes(nodes: &[WorkflowNode]) -> String {
    let mut out = String::from("<nodes>\n");
    let mut next_id = 0usize;
    for node in nodes {
        render_node(&mut out, node, 1, &mut next_id);
    }
    out.push_str("</nodes>");
    out
}

fn render_node(out: &mut String, node: &WorkflowNode, depth: usize, next_id: &mut usize) {
    let pad = "  ".repeat(depth);
    match node {
        WorkflowNode::Normal {
            text,
            input,
            output,
        } => render_normal(out, &pad, text, input, output, next_id),
        WorkflowNode::ForEach { items, nodes } => {
            let _ = writeln!(out, "{pad}<forEach items=\"{items}\">");
            for child in nodes {
                render_node(out, child, depth + 1, next_id);
            }
            let _ = writeln!(out, "{pad}</forEach>");
        }
        WorkflowNode::Watch {
            event,
            loop_,
            description,
            trigger_nodes,
        } => {
            let _ = writeln!(out, "{pad}<watch event=\"{event}\" loop=\"{loop_}\">");
            let _ = writeln!(out, "{pad}  <description>{description}</description>");
            let _ = writeln!(out, "{pad}  <trigger>");
            for trigger in trigger_nodes {
                match trigger {
                    TriggerNode::Normal {
                        text,
                        input,
                        output,
                    } => render_normal(out, &format!("{pad}    "), text, input, output, next_id),
                    TriggerNode::ForEach { items, nodes } => render_node(
                        out,
                        &WorkflowNode::ForEach {
                            items: items.clone(),
                            nodes: nodes.clone(),
                        },
                        depth + 2,
                        next_id,
                    ),
                }
            }
            let _ = writeln!(out, "{pad}  </trigger>");
            let _ = writeln!(out, "{pad}</watch>");
        }
    }
}

fn render_normal(
    out: &mut String,
    pad: &str,
    text: &str,
    input: &Option<String>,
    output: &Option<String>,
    next_id: &mut usize,
) {
    let _ = write!(out, "{pad}<node id=\"{next_id}\"");
    if let Some(input) = input {
        let _ = write!(out, " input=\"{input}\"");
    }
    if let Some(output) = output {
        let _ = write!(out, " output=\"{output}\"");
    }
    let _ = writeln!(out, ">{text}</node>");
    *next_id += 1;
}
