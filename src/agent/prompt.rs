//! System and user prompts for an agent turn.

use std::fmt::Write;
use std::sync::Arc;

use chrono::Local;

use super::context::AgentContext;
use crate::tools::builtin::{HUMAN_INTERACT, VARIABLE_STORAGE};
use crate::tools::Tool;
use crate::workflow::render_nodes;

fn has_tool(tools: &[Arc<dyn Tool>], name: &str) -> bool {
    tools.iter().any(|t| t.name() == name)
}

/// Identity, guidance for the tools in play, and results of earlier agents.
pub fn build_system_prompt(ctx: &AgentContext, tools: &[Arc<dyn Tool>]) -> String {
    let config = ctx.config();
    let agent = ctx.agent();
    let node = ctx.workflow_agent();

    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "You are {}, an autonomous assistant acting as the {} agent.",
        config.name,
        agent.name()
    );
    let _ = writeln!(prompt, "\n# Agent Description\n{}", agent.description());

    let mut guidance = Vec::new();
    if has_tool(tools, HUMAN_INTERACT) {
        guidance.push(format!(
            "* Use `{HUMAN_INTERACT}` before dangerous operations and when blocked by logins, captchas or other checks only a person can pass. Do not call it in parallel."
        ));
    }
    if node.uses_variables() || has_tool(tools, VARIABLE_STORAGE) {
        guidance.push(format!(
            "* Steps with input/output attributes exchange data with other agents through `{VARIABLE_STORAGE}`. Do not call it in parallel."
        ));
    }
    if node.has_for_each() {
        guidance.push("* A forEach node repeats its steps for every item of the named list or variable.".to_string());
    }
    if node.has_watch() {
        guidance.push("* A watch node waits for the described event, then runs its trigger steps.".to_string());
    }
    if !guidance.is_empty() {
        let _ = writeln!(prompt, "\n# Guidance\n{}", guidance.join("\n"));
    }
    if let Some(extra) = agent.system_prompt().map(str::trim).filter(|s| !s.is_empty()) {
        let _ = writeln!(prompt, "\n{extra}");
    }

    let _ = writeln!(prompt, "\nPlatform: {}", config.platform);
    let _ = writeln!(prompt, "Current datetime: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    let chain = ctx.context().chain();
    if chain.agents.len() > 1 {
        let _ = writeln!(prompt, "\nMain task: {}", chain.task_prompt);
        let prior = chain.prior_results(&node.id);
        if !prior.is_empty() {
            prompt.push_str("\n# Pre-task execution results\n");
            for (label, result) in prior {
                let _ = writeln!(prompt, "## {label}\n<taskResult>\n{result}\n</taskResult>");
            }
        }
    }

    if agent.can_parallel_tool_calls() {
        prompt.push_str("\nIndependent tool calls that do not conflict may be issued in parallel.");
    }
    prompt.push_str("\nAnswer in the language of the user's task.");
    prompt.trim().to_string()
}

/// The task this agent must complete, inside the overall task.
pub fn build_user_prompt(ctx: &AgentContext) -> String {
    let node = ctx.workflow_agent();
    let main_task = ctx.context().chain().task_prompt;
    let mut prompt = String::from("<root>\n");
    let _ = writeln!(prompt, "<mainTask>{main_task}</mainTask>");
    let _ = writeln!(prompt, "<currentTask>{}</currentTask>", node.task);
    if !node.nodes.is_empty() {
        prompt.push_str(&render_nodes(&node.nodes));
        prompt.push('\n');
    }
    prompt.push_str("</root>");
    prompt
}
