//! Tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::arguments::ToolArguments;
use super::result::ToolResult;
use super::types::ToolParameters;
use crate::agent::AgentContext;
use crate::callback::CallbackPayload;
use crate::error::HarperError;

/// Everything a tool can reach while it runs.
pub struct ToolExecutionContext<'a> {
    pub agent: &'a AgentContext,
    pub tool_call_id: &'a str,
    pub tool_name: &'a str,
}

impl ToolExecutionContext<'_> {
    pub fn cancellation_token(&self) -> &CancellationToken {
        self.agent.cancellation_token()
    }

    /// Stream progress text for this call to the callback sink.
    pub async fn emit_running(&self, text: impl Into<String>, stream_done: bool) {
        self.agent
            .emit(CallbackPayload::ToolRunning {
                tool_name: self.tool_name.to_string(),
                tool_id: self.tool_call_id.to_string(),
                stream_id: self.tool_call_id.to_string(),
                stream_done,
                text: text.into(),
            })
            .await;
    }

    /// Owned snapshot for handlers that outlive the borrow.
    pub fn info(&self) -> ToolCallInfo {
        ToolCallInfo {
            task_id: self.agent.context().task_id().to_string(),
            agent_name: self.agent.agent().name().to_string(),
            tool_call_id: self.tool_call_id.to_string(),
            cancel: self.cancellation_token().clone(),
        }
    }
}

/// Owned call metadata passed to [`AgentTool`] handlers.
#[derive(Debug, Clone)]
pub struct ToolCallInfo {
    pub task_id: String,
    pub agent_name: String,
    pub tool_call_id: String,
    pub cancel: CancellationToken,
}

/// A capability the model can invoke by name.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the model calls the tool by.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    /// Whether calls may overlap with other calls in the same run.
    ///
    /// Tools returning `false` are serialized across every agent of the run.
    fn supports_parallel_calls(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext<'_>,
    ) -> Result<ToolResult, HarperError>;
}

type ToolHandler = Arc<
    dyn Fn(ToolArguments, ToolCallInfo) -> Pin<Box<dyn Future<Output = Result<ToolResult, HarperError>> + Send>>
        + Send
        + Sync,
>;

/// Tool backed by an async closure.
#[derive(Clone)]
pub struct AgentTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    parallel: bool,
    handler: ToolHandler,
}

impl AgentTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments, ToolCallInfo) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ToolResult, HarperError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            parallel: true,
            handler: Arc::new(move |args, info| Box::pin(handler(args, info))),
        }
    }

    /// Mark the tool as unsafe to run concurrently.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

#[async_trait]
impl Tool for AgentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    fn supports_parallel_calls(&self) -> bool {
        self.parallel
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext<'_>,
    ) -> Result<ToolResult, HarperError> {
        (self.handler)(args.clone(), ctx.info()).await
    }
}

impl std::fmt::Debug for AgentTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentTool")
            .field("name", &self.name)
            .field("parallel", &self.parallel)
            .finish()
    }
}
