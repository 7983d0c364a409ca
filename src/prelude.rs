//! Convenience re-exports for common use.

pub use crate::agent::{Agent, AgentContext, Context};
pub use crate::callback::{
    CallbackPayload, ChannelCallback, HumanCallback, HumanChannel, HumanReply, HumanRequest,
    StreamCallback, StreamCallbackMessage,
};
pub use crate::config::HarperConfig;
pub use crate::error::{HarperError, Result};
pub use crate::llm::{LanguageModel, LlmRequest, LlmResponse, ResponsePart, RetryLanguageModel, StreamPart};
pub use crate::scheduler::{compile, FailurePolicy, RunResult, Scheduler, StopReason};
pub use crate::tools::{AgentTool, Tool, ToolArguments, ToolExecutionContext, ToolParameters, ToolResult};
pub use crate::types::{ContentPart, FinishReason, ModelMessage, Role, ToolChoice, Usage};
pub use crate::workflow::{AgentStatus, Workflow, WorkflowAgent, WorkflowNode};
