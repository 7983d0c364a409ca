//! Callback event types.

use serde::{Deserialize, Serialize};

use crate::tools::ToolResult;
use crate::types::{FinishReason, Usage};
use crate::workflow::{Workflow, WorkflowAgent};

/// Envelope delivered to a [`StreamCallback`](super::StreamCallback).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StreamCallbackMessage {
    pub task_id: String,
    pub agent_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(flatten)]
    pub payload: CallbackPayload,
}

/// Token counts reported with a `finish` event.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinishUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl From<Usage> for FinishUsage {
    fn from(usage: Usage) -> Self {
        Self {
            prompt_tokens: usage.input_tokens,
            completion_tokens: usage.output_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// What happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallbackPayload {
    Workflow {
        workflow: Workflow,
        stream_done: bool,
    },
    AgentStart {
        agent_node: WorkflowAgent,
    },
    Text {
        stream_id: String,
        stream_done: bool,
        text: String,
    },
    Thinking {
        stream_id: String,
        stream_done: bool,
        text: String,
    },
    File {
        mime_type: String,
        data: String,
    },
    ToolStreaming {
        tool_name: String,
        tool_id: String,
        params_text: String,
    },
    ToolUse {
        tool_name: String,
        tool_id: String,
        params: serde_json::Value,
    },
    ToolRunning {
        tool_name: String,
        tool_id: String,
        text: String,
        stream_id: String,
        stream_done: bool,
    },
    ToolResult {
        tool_name: String,
        tool_id: String,
        params: serde_json::Value,
        tool_result: ToolResult,
    },
    AgentResult {
        agent_node: WorkflowAgent,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<String>,
    },
    Error {
        error: String,
    },
    Finish {
        finish_reason: FinishReason,
        usage: FinishUsage,
    },
}

impl CallbackPayload {
    /// Wire tag of this payload.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Workflow { .. } => "workflow",
            Self::AgentStart { .. } => "agent_start",
            Self::Text { .. } => "text",
            Self::Thinking { .. } => "thinking",
            Self::File { .. } => "file",
            Self::ToolStreaming { .. } => "tool_streaming",
            Self::ToolUse { .. } => "tool_use",
            Self::ToolRunning { .. } => "tool_running",
            Self::ToolResult { .. } => "tool_result",
            Self::AgentResult { .. } => "agent_result",
            Self::Error { .. } => "error",
            Self::Finish { .. } => "finish",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_flattens_payload() {
        let message = StreamCallbackMessage {
            task_id: "t1".into(),
            agent_name: "Browser".into(),
            node_id: Some("a".into()),
            payload: CallbackPayload::Text {
                stream_id: "s".into(),
                stream_done: false,
                text: "hi".into(),
            },
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["task_id"], "t1");
        assert_eq!(json["text"], "hi");
        assert_eq!(message.payload.kind(), "text");
        let back: StreamCallbackMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, message);
    }
}
