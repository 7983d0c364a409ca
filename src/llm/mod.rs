//! Language model boundary.
//!
//! The crate ships no provider clients; hosts implement [`LanguageModel`]
//! and hand a list of them to [`RetryLanguageModel`].

pub mod retry;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use tokio_util::sync::CancellationToken;

pub use retry::RetryLanguageModel;

use crate::error::HarperError;
use crate::tools::ToolDefinition;
use crate::types::{AgentToolCall, ContentPart, FinishReason, ModelMessage, Role, ToolChoice, Usage};

/// One model call.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    pub tool_choice: ToolChoice,
    pub max_tokens: u32,
    /// Cancelled when the run is aborted.
    pub abort: CancellationToken,
}

/// Non-streaming output item.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePart {
    Text(String),
    ToolCall(AgentToolCall),
}

impl ResponsePart {
    pub fn as_tool_call(&self) -> Option<&AgentToolCall> {
        match self {
            Self::ToolCall(call) => Some(call),
            Self::Text(_) => None,
        }
    }
}

/// Concatenated text parts.
pub fn response_text(parts: &[ResponsePart]) -> String {
    parts
        .iter()
        .filter_map(|part| match part {
            ResponsePart::Text(text) => Some(text.as_str()),
            ResponsePart::ToolCall(_) => None,
        })
        .collect()
}

/// Assistant turn recording `parts`.
pub fn assistant_message(parts: &[ResponsePart]) -> ModelMessage {
    let content = parts
        .iter()
        .filter_map(|part| match part {
            ResponsePart::Text(text) if text.is_empty() => None,
            ResponsePart::Text(text) => Some(ContentPart::text(text.clone())),
            ResponsePart::ToolCall(call) => Some(ContentPart::ToolCall(call.clone())),
        })
        .collect();
    ModelMessage::new(Role::Assistant, content)
}

/// Complete response of a model call.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmResponse {
    pub parts: Vec<ResponsePart>,
    pub reasoning: Option<String>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

/// Incremental output of a streaming call.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamPart {
    TextDelta(String),
    ReasoningDelta(String),
    /// Partial JSON of a tool call's input.
    ToolInputDelta {
        id: String,
        name: String,
        delta: String,
    },
    /// A fully assembled tool call.
    ToolCall(AgentToolCall),
    /// Generated file, forwarded to the host but not kept in history.
    File {
        media_type: String,
        data: String,
    },
    Finish {
        finish_reason: FinishReason,
        usage: Usage,
    },
}

/// A chat model with function calling.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn name(&self) -> &str;

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, HarperError>;

    /// Streaming variant. The default replays [`generate`](Self::generate).
    async fn stream(
        &self,
        request: &LlmRequest,
    ) -> Result<BoxStream<'static, Result<StreamPart, HarperError>>, HarperError> {
        let response = self.generate(request).await?;
        let mut parts = Vec::new();
        if let Some(reasoning) = response.reasoning {
            parts.push(Ok(StreamPart::ReasoningDelta(reasoning)));
        }
        for part in response.parts {
            parts.push(Ok(match part {
                ResponsePart::Text(text) => StreamPart::TextDelta(text),
                ResponsePart::ToolCall(call) => StreamPart::ToolCall(call),
            }));
        }
        parts.push(Ok(StreamPart::Finish {
            finish_reason: response.finish_reason,
            usage: response.usage,
        }));
        Ok(Box::pin(stream::iter(parts)))
    }
}
