//! The react loop: call the model, run its tools, repeat.

use std::sync::Arc;

use super::context::AgentContext;
use super::llm::call_agent_llm;
use super::tooling::execute_tool_calls;
use crate::error::HarperError;
use crate::llm::{assistant_message, response_text, ResponsePart};
use crate::memory::{compress_agent_messages, handle_large_context_messages, remove_duplicate_tool_use};
use crate::tools::registry::convert_tools;
use crate::tools::Tool;
use crate::types::{AgentToolCall, ModelMessage, ToolChoice};

pub(super) async fn run_react_loop(
    ctx: &mut AgentContext,
    tools: &[Arc<dyn Tool>],
) -> Result<String, HarperError> {
    let definitions = convert_tools(tools);
    let context = Arc::clone(ctx.context());
    let config = context.config();

    for turn in 0..config.max_react_num {
        ctx.check_aborted()?;
        handle_large_context_messages(&mut ctx.messages, config);

        let parts = call_agent_llm(ctx, ctx.messages.clone(), &definitions, ToolChoice::Auto).await?;
        let parts = remove_duplicate_tool_use(parts);
        let calls: Vec<AgentToolCall> = parts
            .iter()
            .filter_map(ResponsePart::as_tool_call)
            .cloned()
            .collect();

        if calls.is_empty() {
            let result = response_text(&parts);
            tracing::debug!(
                task_id = %context.task_id(),
                agent = %ctx.agent().name(),
                turns = turn + 1,
                "agent finished"
            );
            return Ok(result);
        }

        ctx.messages.push(assistant_message(&parts));
        let results = execute_tool_calls(ctx, tools, &calls).await;
        ctx.messages.push(ModelMessage::tool(results));

        if ctx.messages.len() >= config.compress_threshold {
            compress_agent_messages(ctx, &definitions).await;
        }
    }

    Err(HarperError::MaxIterations(ctx.agent().name().to_string()))
}
