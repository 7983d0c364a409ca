//! Tool-call execution and conversion of results into tool turns.

use std::sync::Arc;

use futures::future;

use super::context::AgentContext;
use crate::callback::CallbackPayload;
use crate::error::HarperError;
use crate::tools::registry::get_tool;
use crate::tools::{Tool, ToolArguments, ToolExecutionContext, ToolResult};
use crate::types::{AgentToolCall, ToolResultContent, ToolResultOutput, ToolResultPart};
use crate::util::text::{char_len, sub};
use crate::util::timeout::with_cancel;

/// Shared-variable prefix under which oversized tool output is stored.
pub const TOOL_OUTPUT_VARIABLE_PREFIX: &str = "tool_output_";

/// Run a batch of calls from one model response.
///
/// Calls run concurrently when the agent allows it and every tool in the
/// batch supports it; otherwise one at a time, in order.
pub(crate) async fn execute_tool_calls(
    ctx: &AgentContext,
    tools: &[Arc<dyn Tool>],
    calls: &[AgentToolCall],
) -> Vec<ToolResultPart> {
    let parallel = ctx.agent().can_parallel_tool_calls()
        && calls.len() > 1
        && calls.iter().all(|call| {
            get_tool(tools, &call.name).map_or(true, |tool| tool.supports_parallel_calls())
        });

    let outcomes = if parallel {
        future::join_all(calls.iter().map(|call| execute_tool_call(ctx, tools, call))).await
    } else {
        let mut outcomes = Vec::with_capacity(calls.len());
        for call in calls {
            outcomes.push(execute_tool_call(ctx, tools, call).await);
        }
        outcomes
    };

    let mut parts = Vec::with_capacity(outcomes.len());
    for (call, result) in calls.iter().zip(outcomes) {
        parts.push(convert_tool_result(ctx, call, result).await);
    }
    parts
}

async fn execute_tool_call(
    ctx: &AgentContext,
    tools: &[Arc<dyn Tool>],
    call: &AgentToolCall,
) -> ToolResult {
    let params = call.arguments_value();
    let result = match get_tool(tools, &call.name) {
        Some(tool) => {
            let args = ToolArguments::new(params.clone());
            let exec = ToolExecutionContext {
                agent: ctx,
                tool_call_id: &call.id,
                tool_name: &call.name,
            };
            let outcome = if tool.supports_parallel_calls() {
                with_cancel(ctx.cancellation_token(), tool.execute(&args, &exec)).await
            } else {
                let _guard = ctx.context().serial_tool_lock(&call.name).await;
                with_cancel(ctx.cancellation_token(), tool.execute(&args, &exec)).await
            };
            match outcome {
                Ok(result) => result,
                Err(HarperError::Aborted) => ToolResult::error("canceled"),
                Err(error) => {
                    tracing::warn!(
                        task_id = %ctx.context().task_id(),
                        agent = %ctx.agent().name(),
                        tool = %call.name,
                        error = %error,
                        "tool execution failed"
                    );
                    ToolResult::error(error.to_string())
                }
            }
        }
        None => ToolResult::error(format!("Tool '{}' not found", call.name)),
    };

    ctx.emit(CallbackPayload::ToolResult {
        tool_name: call.name.clone(),
        tool_id: call.id.clone(),
        params,
        tool_result: result.clone(),
    })
    .await;
    result
}

/// Shape a [`ToolResult`] for the model.
///
/// Text longer than `file_text_max_length` is parked in the run's shared
/// variables and replaced by a reference plus its leading characters.
pub async fn convert_tool_result(
    ctx: &AgentContext,
    call: &AgentToolCall,
    result: ToolResult,
) -> ToolResultPart {
    let config = ctx.config();
    let limit = config.file_text_max_length;

    let mut content = Vec::with_capacity(result.content.len());
    for item in result.content {
        match item {
            ToolResultContent::Text { text } if char_len(&text) > limit => {
                let key = format!("{TOOL_OUTPUT_VARIABLE_PREFIX}{}", call.id);
                let head = sub(&text, limit, true);
                ctx.context()
                    .variables()
                    .write()
                    .await
                    .insert(key.clone(), serde_json::Value::String(text));
                content.push(ToolResultContent::text(format!(
                    "[Output too long; full text stored in variable `{key}`]\n{head}"
                )));
            }
            ToolResultContent::Media { .. } if !config.tool_result_multimodal => {}
            other => content.push(other),
        }
    }

    let single_text = match content.as_slice() {
        [ToolResultContent::Text { text }] => Some(text.clone()),
        _ => None,
    };
    let output = if content.is_empty() || single_text.is_some() {
        let text = single_text.unwrap_or_default();
        if result.is_error {
            ToolResultOutput::ErrorText {
                value: format!("Error: {text}"),
            }
        } else if text.is_empty() {
            ToolResultOutput::Text {
                value: "Successful".into(),
            }
        } else {
            ToolResultOutput::Text { value: text }
        }
    } else {
        ToolResultOutput::Content { value: content }
    };

    ToolResultPart {
        tool_call_id: call.id.clone(),
        tool_name: call.name.clone(),
        output,
    }
}
