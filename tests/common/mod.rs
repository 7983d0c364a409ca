//! Shared test helpers and mock language model.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;

use harper::prelude::*;
use harper::types::AgentToolCall;

type Handler = Box<dyn Fn(&LlmRequest) -> Result<LlmResponse> + Send + Sync>;

/// A model that answers from a queue, or from a handler when one is set.
pub struct MockModel {
    name: String,
    responses: Mutex<VecDeque<Result<LlmResponse>>>,
    handler: Option<Handler>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl MockModel {
    pub fn scripted(name: &str) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(VecDeque::new()),
            handler: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_handler<F>(name: &str, handler: F) -> Self
    where
        F: Fn(&LlmRequest) -> Result<LlmResponse> + Send + Sync + 'static,
    {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::scripted(name)
        }
    }

    pub fn queue_text(&self, text: &str) {
        self.responses.lock().unwrap().push_back(Ok(text_response(text)));
    }

    pub fn queue_tool_call(&self, id: &str, name: &str, args: serde_json::Value) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(tool_response(vec![(id, name, args)])));
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_error(&self, error: HarperError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Every request received so far.
    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(handler) = &self.handler {
            return handler(request);
        }
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(text_response("Mock response")))
    }
}

pub fn text_response(text: &str) -> LlmResponse {
    LlmResponse {
        parts: vec![ResponsePart::Text(text.to_string())],
        reasoning: None,
        finish_reason: FinishReason::Stop,
        usage: Usage::new(10, 20),
    }
}

pub fn tool_response(calls: Vec<(&str, &str, serde_json::Value)>) -> LlmResponse {
    LlmResponse {
        parts: calls
            .into_iter()
            .map(|(id, name, args)| ResponsePart::ToolCall(AgentToolCall::new(id, name, args)))
            .collect(),
        reasoning: None,
        finish_reason: FinishReason::ToolCalls,
        usage: Usage::new(10, 5),
    }
}

/// Name of the agent a request was made for, read from its system prompt.
pub fn agent_of(request: &LlmRequest) -> String {
    let system = request.messages[0].text();
    system
        .split("acting as the ")
        .nth(1)
        .and_then(|rest| rest.split(" agent").next())
        .unwrap_or_default()
        .to_string()
}

/// Number of tool turns in a request's history.
pub fn tool_turns(request: &LlmRequest) -> usize {
    request
        .messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .count()
}

/// Wrap a model the way a host would.
pub fn retry_model(model: Arc<MockModel>) -> RetryLanguageModel {
    RetryLanguageModel::new(vec![model as Arc<dyn LanguageModel>], 1)
}

/// Collect everything already sent to a channel callback.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<StreamCallbackMessage>) -> Vec<StreamCallbackMessage> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Wire tags of `events`, in order.
pub fn kinds(events: &[StreamCallbackMessage]) -> Vec<&'static str> {
    events.iter().map(|e| e.payload.kind()).collect()
}

/// Output of the most recent tool result in a request's history.
pub fn last_tool_output(request: &LlmRequest) -> Option<harper::types::ToolResultOutput> {
    request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == Role::Tool)
        .and_then(|m| m.tool_results().last().map(|r| r.output.clone()))
}

/// Text of a tool output, whatever its shape.
pub fn output_text(output: &harper::types::ToolResultOutput) -> String {
    use harper::types::{ToolResultContent, ToolResultOutput};
    match output {
        ToolResultOutput::Text { value } | ToolResultOutput::ErrorText { value } => value.clone(),
        ToolResultOutput::Json { value } => value.to_string(),
        ToolResultOutput::Content { value } => value
            .iter()
            .filter_map(|item| match item {
                ToolResultContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}
