//! Human-in-the-loop hooks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tokio::sync::{mpsc, oneshot};

use crate::agent::AgentContext;
use crate::error::HarperError;
use crate::util::timeout::with_cancel;

/// Kind of help an agent asks a person for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HelpType {
    RequestLogin,
    RequestAssistance,
}

/// Host-side answers to agent questions.
///
/// Implementations may block for as long as a person needs; callers race
/// each call against the run's cancellation token.
#[async_trait]
pub trait HumanCallback: Send + Sync {
    async fn confirm(&self, ctx: &AgentContext, prompt: &str) -> Result<bool, HarperError>;

    async fn input(&self, ctx: &AgentContext, prompt: &str) -> Result<String, HarperError>;

    async fn select(
        &self,
        ctx: &AgentContext,
        prompt: &str,
        options: &[String],
        multiple: bool,
    ) -> Result<Vec<String>, HarperError>;

    /// Returns whether the person resolved the situation.
    async fn help(
        &self,
        ctx: &AgentContext,
        help_type: HelpType,
        prompt: &str,
    ) -> Result<bool, HarperError>;
}

/// Question forwarded by [`HumanChannel`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HumanRequestKind {
    Confirm {
        prompt: String,
    },
    Input {
        prompt: String,
    },
    Select {
        prompt: String,
        options: Vec<String>,
        multiple: bool,
    },
    Help {
        help_type: HelpType,
        prompt: String,
    },
}

/// Answer sent back through a [`HumanRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum HumanReply {
    Confirmed(bool),
    Text(String),
    Selected(Vec<String>),
}

/// A pending question; answer it with [`HumanRequest::respond`].
#[derive(Debug)]
pub struct HumanRequest {
    pub task_id: String,
    pub agent_name: String,
    pub kind: HumanRequestKind,
    responder: oneshot::Sender<HumanReply>,
}

impl HumanRequest {
    /// Deliver the answer. Returns `false` when the asking agent is gone.
    pub fn respond(self, reply: HumanReply) -> bool {
        self.responder.send(reply).is_ok()
    }
}

/// [`HumanCallback`] that hands questions to the host over a channel.
#[derive(Debug, Clone)]
pub struct HumanChannel {
    sender: mpsc::Sender<HumanRequest>,
}

impl HumanChannel {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<HumanRequest>) {
        let (sender, receiver) = mpsc::channel(buffer.max(1));
        (Self { sender }, receiver)
    }

    async fn ask(
        &self,
        ctx: &AgentContext,
        kind: HumanRequestKind,
    ) -> Result<HumanReply, HarperError> {
        let cancel = ctx.cancellation_token();
        let (responder, answer) = oneshot::channel();
        let request = HumanRequest {
            task_id: ctx.context().task_id().to_string(),
            agent_name: ctx.agent().name().to_string(),
            kind,
            responder,
        };
        tracing::debug!(
            task_id = %request.task_id,
            agent = %request.agent_name,
            "waiting for human reply"
        );
        with_cancel(cancel, async {
            self.sender
                .send(request)
                .await
                .map_err(|_| HarperError::InvalidState("human channel closed".into()))
        })
        .await?;
        with_cancel(cancel, async {
            answer
                .await
                .map_err(|_| HarperError::InvalidState("human request dropped unanswered".into()))
        })
        .await
    }
}

fn unexpected(reply: HumanReply, wanted: &str) -> HarperError {
    HarperError::InvalidArgument(format!("expected {wanted} reply, got {reply:?}"))
}

#[async_trait]
impl HumanCallback for HumanChannel {
    async fn confirm(&self, ctx: &AgentContext, prompt: &str) -> Result<bool, HarperError> {
        let kind = HumanRequestKind::Confirm {
            prompt: prompt.to_string(),
        };
        match self.ask(ctx, kind).await? {
            HumanReply::Confirmed(value) => Ok(value),
            other => Err(unexpected(other, "confirm")),
        }
    }

    async fn input(&self, ctx: &AgentContext, prompt: &str) -> Result<String, HarperError> {
        let kind = HumanRequestKind::Input {
            prompt: prompt.to_string(),
        };
        match self.ask(ctx, kind).await? {
            HumanReply::Text(value) => Ok(value),
            other => Err(unexpected(other, "text")),
        }
    }

    async fn select(
        &self,
        ctx: &AgentContext,
        prompt: &str,
        options: &[String],
        multiple: bool,
    ) -> Result<Vec<String>, HarperError> {
        let kind = HumanRequestKind::Select {
            prompt: prompt.to_string(),
            options: options.to_vec(),
            multiple,
        };
        match self.ask(ctx, kind).await? {
            HumanReply::Selected(values) => Ok(values),
            other => Err(unexpected(other, "selection")),
        }
    }

    async fn help(
        &self,
        ctx: &AgentContext,
        help_type: HelpType,
        prompt: &str,
    ) -> Result<bool, HarperError> {
        let kind = HumanRequestKind::Help {
            help_type,
            prompt: prompt.to_string(),
        };
        match self.ask(ctx, kind).await? {
            HumanReply::Confirmed(value) => Ok(value),
            other => Err(unexpected(other, "confirm")),
        }
    }
}
