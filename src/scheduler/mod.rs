//! Compiles a workflow into stages and runs them.

use std::sync::Arc;

use futures::future;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::agent::Context;
use crate::callback::CallbackPayload;
use crate::chain::{AgentChain, AgentNode, ExecutionPlan, NormalAgentNode, ParallelAgentNode};
use crate::config::HarperConfig;
use crate::error::HarperError;
use crate::types::Usage;
use crate::workflow::{AgentStatus, DependencyGraph, Workflow};

/// What to do when an agent fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Cancel running siblings and stop before the next stage.
    #[default]
    FailFast,
    /// Record the failure and keep going; dependants see only successful results.
    Continue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StopReason {
    Done,
    Error,
    Abort,
}

/// Outcome of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub task_id: String,
    pub success: bool,
    pub stop_reason: StopReason,
    /// Result of the final stage.
    pub result: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Tokens spent across every model call of the run.
    #[serde(default)]
    pub usage: Usage,
}

/// Levelize the workflow's dependency graph into an execution plan.
///
/// With `agent_parallel` off, or for a stage of one, every agent gets its own
/// normal node in workflow order. Otherwise the stage's agents share one
/// parallel node, except those marked `parallel: false`, which follow it as
/// normal nodes.
pub fn compile(workflow: &Workflow, config: &HarperConfig) -> Result<ExecutionPlan, HarperError> {
    let graph = DependencyGraph::build(workflow)?;
    let mut plan = ExecutionPlan::new();
    for level in graph.levels() {
        let (grouped, solo): (Vec<usize>, Vec<usize>) = if config.agent_parallel {
            level
                .into_iter()
                .partition(|&index| workflow.agents[index].parallel != Some(false))
        } else {
            (Vec::new(), level)
        };
        match grouped.len() {
            0 => {}
            1 => plan.push(AgentNode::Normal(NormalAgentNode::new(grouped[0]))),
            _ => plan.push(AgentNode::Parallel(ParallelAgentNode {
                agents: grouped.into_iter().map(NormalAgentNode::new).collect(),
                result: None,
            })),
        }
        for index in solo {
            plan.push(AgentNode::Normal(NormalAgentNode::new(index)));
        }
    }
    Ok(plan)
}

/// Drives an [`ExecutionPlan`] to completion.
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    policy: FailurePolicy,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    /// Compile the context's workflow and run it.
    pub async fn execute(&self, context: Arc<Context>) -> RunResult {
        let workflow = context.workflow();
        match compile(&workflow, context.config()) {
            Ok(mut plan) => self.run(&mut plan, context).await,
            Err(error) => {
                tracing::error!(task_id = %context.task_id(), error = %error, "workflow rejected");
                context
                    .emit(
                        &workflow.name,
                        None,
                        CallbackPayload::Error {
                            error: error.to_string(),
                        },
                    )
                    .await;
                RunResult {
                    task_id: context.task_id().to_string(),
                    success: false,
                    stop_reason: StopReason::Error,
                    result: String::new(),
                    error: Some(error.to_string()),
                    usage: Usage::default(),
                }
            }
        }
    }

    pub async fn run(&self, plan: &mut ExecutionPlan, context: Arc<Context>) -> RunResult {
        let workflow = context.workflow();
        tracing::info!(
            task_id = %context.task_id(),
            plan = %plan.describe(&workflow),
            policy = %self.policy,
            "run started"
        );
        let workflow_name = workflow.name.clone();
        context
            .emit(
                &workflow_name,
                None,
                CallbackPayload::Workflow {
                    workflow,
                    stream_done: true,
                },
            )
            .await;

        let mut first_error: Option<HarperError> = None;
        let mut cursor = plan.head();
        while let Some(index) = cursor {
            if context.is_aborted() {
                break;
            }
            let Some(stage) = plan.stage_mut(index) else {
                break;
            };
            tracing::debug!(task_id = %context.task_id(), stage = index, "stage started");
            let failures = self.run_stage(stage, &context).await;
            let failed = !failures.is_empty();
            for error in failures {
                let replace = match &first_error {
                    None => true,
                    Some(existing) => existing.is_aborted() && !error.is_aborted(),
                };
                if replace {
                    first_error = Some(error);
                }
            }
            if failed && self.policy == FailurePolicy::FailFast {
                break;
            }
            cursor = plan.next(index);
        }

        let stop_reason = match &first_error {
            Some(error) if !error.is_aborted() => StopReason::Error,
            _ if context.is_aborted() => StopReason::Abort,
            Some(_) => StopReason::Abort,
            None => StopReason::Done,
        };
        let error = match stop_reason {
            StopReason::Done => None,
            StopReason::Abort => Some(HarperError::Aborted.to_string()),
            StopReason::Error => first_error.as_ref().map(ToString::to_string),
        };
        if let Some(message) = &error {
            context
                .emit(
                    &workflow_name,
                    None,
                    CallbackPayload::Error {
                        error: message.clone(),
                    },
                )
                .await;
        }
        tracing::info!(
            task_id = %context.task_id(),
            stop_reason = %stop_reason,
            "run finished"
        );

        RunResult {
            task_id: context.task_id().to_string(),
            success: stop_reason == StopReason::Done,
            stop_reason,
            result: plan.last_result().unwrap_or_default().to_string(),
            error,
            usage: context.usage().total_usage(),
        }
    }

    async fn run_stage(&self, stage: &mut AgentNode, context: &Arc<Context>) -> Vec<HarperError> {
        match stage {
            AgentNode::Normal(node) => match self.run_member(context, node.agent).await {
                Ok(result) => {
                    node.result = Some(result);
                    Vec::new()
                }
                Err(error) => vec![error],
            },
            AgentNode::Parallel(node) => {
                let outcomes = future::join_all(
                    node.agents
                        .iter()
                        .map(|member| self.run_member(context, member.agent)),
                )
                .await;
                let mut errors = Vec::new();
                let mut results = Vec::new();
                for (member, outcome) in node.agents.iter_mut().zip(outcomes) {
                    match outcome {
                        Ok(result) => {
                            results.push(result.clone());
                            member.result = Some(result);
                        }
                        Err(error) => errors.push(error),
                    }
                }
                if !results.is_empty() {
                    node.result = Some(results.join("\n\n"));
                }
                errors
            }
        }
    }

    async fn run_member(&self, context: &Arc<Context>, index: usize) -> Result<String, HarperError> {
        let outcome = run_agent(context, index).await;
        if let Err(error) = &outcome {
            if !error.is_aborted() && self.policy == FailurePolicy::FailFast {
                context.abort();
            }
        }
        outcome
    }
}

async fn run_agent(context: &Arc<Context>, index: usize) -> Result<String, HarperError> {
    let mut workflow_agent = context
        .workflow_agent(index)
        .ok_or_else(|| HarperError::InvalidWorkflow(format!("no workflow agent at index {index}")))?;
    let id = workflow_agent.id.clone();

    let agent = match context.agent(&workflow_agent.name) {
        Some(agent) => agent,
        None => {
            let error = HarperError::InvalidWorkflow(format!(
                "no agent registered under the name '{}'",
                workflow_agent.name
            ));
            finish_agent(context, &workflow_agent, Err(&error)).await;
            return Err(error);
        }
    };
    if let Err(error) = context.check_aborted() {
        finish_agent(context, &workflow_agent, Err(&error)).await;
        return Err(error);
    }

    context.update_agent_status(&id, AgentStatus::Running)?;
    workflow_agent.status = AgentStatus::Running;
    context.push_chain(AgentChain::new(workflow_agent.clone()));
    context
        .emit(
            agent.name(),
            Some(&id),
            CallbackPayload::AgentStart {
                agent_node: workflow_agent.clone(),
            },
        )
        .await;
    tracing::info!(task_id = %context.task_id(), agent = %agent.name(), node = %id, "agent started");

    match agent.run(Arc::clone(context), workflow_agent.clone()).await {
        Ok(result) => {
            context.set_chain_result(&id, &result);
            finish_agent(context, &workflow_agent, Ok(&result)).await;
            Ok(result)
        }
        Err(error) => {
            finish_agent(context, &workflow_agent, Err(&error)).await;
            if error.is_aborted() {
                return Err(error);
            }
            Err(HarperError::AgentFailed {
                agent: workflow_agent.name.clone(),
                message: error.to_string(),
            })
        }
    }
}

/// Record the terminal status and report it.
async fn finish_agent(
    context: &Context,
    workflow_agent: &crate::workflow::WorkflowAgent,
    outcome: Result<&str, &HarperError>,
) {
    let status = if outcome.is_ok() {
        AgentStatus::Done
    } else {
        AgentStatus::Error
    };
    if let Err(error) = context.update_agent_status(&workflow_agent.id, status) {
        tracing::warn!(node = %workflow_agent.id, error = %error, "status update rejected");
    }
    let mut agent_node = workflow_agent.clone();
    agent_node.status = status;
    let (result, error) = match outcome {
        Ok(result) => (Some(result.to_string()), None),
        Err(error) => {
            tracing::warn!(
                task_id = %context.task_id(),
                agent = %workflow_agent.name,
                node = %workflow_agent.id,
                error = %error,
                "agent failed"
            );
            (None, Some(error.to_string()))
        }
    };
    context
        .emit(
            &workflow_agent.name,
            Some(&workflow_agent.id),
            CallbackPayload::AgentResult {
                agent_node,
                error,
                result,
            },
        )
        .await;
}
