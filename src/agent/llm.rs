//! One streamed model call on behalf of an agent.

use std::collections::HashMap;

use futures::StreamExt;
use uuid::Uuid;

use super::context::AgentContext;
use crate::callback::CallbackPayload;
use crate::error::HarperError;
use crate::llm::{LlmRequest, ResponsePart, StreamPart};
use crate::tools::ToolDefinition;
use crate::types::{ModelMessage, ToolChoice};

/// Stream a model response, forwarding deltas to the callback sink, and
/// return the response parts in the order they arrived.
pub(crate) async fn call_agent_llm(
    ctx: &AgentContext,
    messages: Vec<ModelMessage>,
    tools: &[ToolDefinition],
    tool_choice: ToolChoice,
) -> Result<Vec<ResponsePart>, HarperError> {
    ctx.check_aborted()?;
    let cancel = ctx.cancellation_token();
    let request = LlmRequest {
        messages,
        tools: tools.to_vec(),
        tool_choice,
        max_tokens: ctx.config().max_tokens,
        abort: cancel.clone(),
    };
    let (model, mut stream) = ctx.llm().stream(&request).await?;
    tracing::debug!(
        task_id = %ctx.context().task_id(),
        agent = %ctx.agent().name(),
        model = %model,
        messages = request.messages.len(),
        tools = request.tools.len(),
        "model call started"
    );

    let text_stream_id = Uuid::new_v4().to_string();
    let thinking_stream_id = Uuid::new_v4().to_string();
    let mut text = String::new();
    let mut reasoning = String::new();
    let mut segment = String::new();
    let mut parts = Vec::new();
    let mut tool_inputs: HashMap<String, String> = HashMap::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(HarperError::Aborted),
            next = stream.next() => next,
        };
        let Some(part) = next else {
            break;
        };
        match part? {
            StreamPart::TextDelta(delta) => {
                text.push_str(&delta);
                segment.push_str(&delta);
                ctx.emit(CallbackPayload::Text {
                    stream_id: text_stream_id.clone(),
                    stream_done: false,
                    text: text.clone(),
                })
                .await;
            }
            StreamPart::ReasoningDelta(delta) => {
                reasoning.push_str(&delta);
                ctx.emit(CallbackPayload::Thinking {
                    stream_id: thinking_stream_id.clone(),
                    stream_done: false,
                    text: reasoning.clone(),
                })
                .await;
            }
            StreamPart::ToolInputDelta { id, name, delta } => {
                let params_text = tool_inputs.entry(id.clone()).or_default();
                params_text.push_str(&delta);
                let params_text = params_text.clone();
                ctx.emit(CallbackPayload::ToolStreaming {
                    tool_name: name,
                    tool_id: id,
                    params_text,
                })
                .await;
            }
            StreamPart::ToolCall(call) => {
                ctx.emit(CallbackPayload::ToolUse {
                    tool_name: call.name.clone(),
                    tool_id: call.id.clone(),
                    params: call.arguments_value(),
                })
                .await;
                if !segment.is_empty() {
                    parts.push(ResponsePart::Text(std::mem::take(&mut segment)));
                }
                parts.push(ResponsePart::ToolCall(call));
            }
            StreamPart::File { media_type, data } => {
                ctx.emit(CallbackPayload::File {
                    mime_type: media_type,
                    data,
                })
                .await;
            }
            StreamPart::Finish {
                finish_reason,
                usage,
            } => {
                ctx.context().usage().record(&usage);
                ctx.emit(CallbackPayload::Finish {
                    finish_reason,
                    usage: usage.into(),
                })
                .await;
            }
        }
    }

    if !reasoning.is_empty() {
        ctx.emit(CallbackPayload::Thinking {
            stream_id: thinking_stream_id,
            stream_done: true,
            text: reasoning,
        })
        .await;
    }
    if !text.is_empty() {
        ctx.emit(CallbackPayload::Text {
            stream_id: text_stream_id,
            stream_done: true,
            text,
        })
        .await;
    }

    if !segment.is_empty() {
        parts.push(ResponsePart::Text(segment));
    }
    Ok(parts)
}
