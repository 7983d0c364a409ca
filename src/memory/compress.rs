//! Replaces the middle of a long history with a model-written snapshot.

use std::collections::HashSet;
use std::ops::Range;

use crate::agent::llm::call_agent_llm;
use crate::agent::AgentContext;
use crate::callback::CallbackPayload;
use crate::error::HarperError;
use crate::tools::builtin::TaskSnapshotTool;
use crate::tools::registry::{merge_tools, NamedTool, ToolDefinition};
use crate::tools::{Tool, ToolArguments, ToolExecutionContext};
use crate::types::{tool_pairing_is_consistent, ContentPart, ModelMessage, Role, ToolChoice};

/// Instruction appended to the history when asking for a snapshot.
pub const SNAPSHOT_INSTRUCTION: &str = "Please create a snapshot backup of the current task, keeping only key important information and node completion status.";

/// Histories shorter than this are never compressed.
const MIN_COMPRESSIBLE_MESSAGES: usize = 5;

/// Most recent turns a snapshot never replaces.
const PRESERVED_TAIL: usize = 3;

/// Tools whose results appear in `messages`, in first-use order.
pub fn extract_used_tool<T: NamedTool + Clone>(messages: &[ModelMessage], tools: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    let mut used = Vec::new();
    for message in messages.iter().filter(|m| m.role == Role::Tool) {
        for part in &message.content {
            let ContentPart::ToolResult(result) = part else {
                continue;
            };
            if !seen.insert(result.tool_name.as_str()) {
                continue;
            }
            if let Some(tool) = tools.iter().find(|t| t.tool_name() == result.tool_name) {
                used.push(tool.clone());
            }
        }
    }
    used
}

/// Summarise the agent's history into a snapshot turn.
///
/// Failures are logged and leave the history as it was.
pub async fn compress_agent_messages(ctx: &mut AgentContext, tools: &[ToolDefinition]) {
    if ctx.messages.len() < MIN_COMPRESSIBLE_MESSAGES {
        return;
    }
    match do_compress(ctx, tools).await {
        Ok(true) => tracing::info!(
            task_id = %ctx.context().task_id(),
            agent = %ctx.agent().name(),
            messages = ctx.messages.len(),
            "history compressed"
        ),
        Ok(false) => tracing::debug!(
            agent = %ctx.agent().name(),
            "history left uncompressed"
        ),
        Err(error) => tracing::error!(
            task_id = %ctx.context().task_id(),
            agent = %ctx.agent().name(),
            error = %error,
            "error compressing agent messages"
        ),
    }
}

async fn do_compress(ctx: &mut AgentContext, tools: &[ToolDefinition]) -> Result<bool, HarperError> {
    let first_tool_index = find_first_tool_index(&ctx.messages);
    let last_tool_index = find_last_tool_index(&ctx.messages);
    if splice_range(&ctx.messages, first_tool_index, last_tool_index).is_none() {
        return Ok(false);
    }

    let snapshot_tool = TaskSnapshotTool::new();
    let definitions = merge_tools(
        extract_used_tool(&ctx.messages, tools),
        vec![ToolDefinition::from_tool(&snapshot_tool)],
    );
    let mut request = ctx.messages[..=last_tool_index].to_vec();
    request.push(ModelMessage::user(SNAPSHOT_INSTRUCTION));

    let parts = call_agent_llm(
        ctx,
        request,
        &definitions,
        ToolChoice::tool(snapshot_tool.name()),
    )
    .await?;
    let call = parts
        .iter()
        .find_map(|part| part.as_tool_call())
        .cloned()
        .ok_or_else(|| HarperError::llm("snapshot", "model returned no snapshot tool call"))?;

    let params = call.arguments_value();
    let args = ToolArguments::new(params.clone());
    let exec = ToolExecutionContext {
        agent: &*ctx,
        tool_call_id: &call.id,
        tool_name: &call.name,
    };
    let result = snapshot_tool.execute(&args, &exec).await?;
    let snapshot = result.text_content();
    ctx.emit(CallbackPayload::ToolResult {
        tool_name: call.name.clone(),
        tool_id: call.id.clone(),
        params,
        tool_result: result,
    })
    .await;

    Ok(splice_snapshot(
        &mut ctx.messages,
        first_tool_index,
        last_tool_index,
        &snapshot,
    ))
}

/// Index of the first tool turn, or 3 when there is none.
pub(crate) fn find_first_tool_index(messages: &[ModelMessage]) -> usize {
    messages
        .iter()
        .position(|m| m.role == Role::Tool)
        .unwrap_or(3)
}

/// Index of the most recent tool turn between the opening exchange and the
/// preserved tail, or the last index when there is none.
pub(crate) fn find_last_tool_index(messages: &[ModelMessage]) -> usize {
    let last = messages.len().saturating_sub(1);
    let tail_start = messages.len().saturating_sub(PRESERVED_TAIL);
    (4..tail_start)
        .rev()
        .find(|&i| messages[i].role == Role::Tool)
        .unwrap_or(last)
}

/// Turns a snapshot would replace: after the first tool turn, up to the
/// assistant turn answered at `last_tool_index`, never reaching into the
/// final [`PRESERVED_TAIL`] turns.
///
/// `None` when the span is empty or removing it would orphan a tool call or
/// result.
pub(crate) fn splice_range(
    messages: &[ModelMessage],
    first_tool_index: usize,
    last_tool_index: usize,
) -> Option<Range<usize>> {
    let start = first_tool_index + 1;
    let end = last_tool_index
        .saturating_sub(1)
        .min(messages.len().saturating_sub(PRESERVED_TAIL));
    if start >= end {
        return None;
    }
    let mut kept = Vec::with_capacity(messages.len() - (end - start));
    kept.extend_from_slice(&messages[..start]);
    kept.extend_from_slice(&messages[end..]);
    tool_pairing_is_consistent(&kept).then_some(start..end)
}

/// Replace [`splice_range`] with one user turn holding `snapshot`.
///
/// Returns `false`, leaving `messages` untouched, when there is nothing safe
/// to replace.
pub(crate) fn splice_snapshot(
    messages: &mut Vec<ModelMessage>,
    first_tool_index: usize,
    last_tool_index: usize,
    snapshot: &str,
) -> bool {
    let Some(range) = splice_range(messages, first_tool_index, last_tool_index) else {
        return false;
    };
    messages.splice(range, [ModelMessage::user(snapshot)]);
    true
}
