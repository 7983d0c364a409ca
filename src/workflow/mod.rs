//! Workflow plan: agents, their dependencies and node hints.

pub mod graph;
pub mod node;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::Display;

pub use graph::DependencyGraph;
pub use node::{render_nodes, TriggerNode, WatchEvent, WorkflowNode};

use crate::error::HarperError;

/// Lifecycle of a workflow agent. Moves forward only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AgentStatus {
    #[default]
    Init,
    Running,
    Done,
    Error,
}

impl AgentStatus {
    /// `Init -> Running -> {Done, Error}`; an agent that never starts may go
    /// straight from `Init` to `Error`.
    pub fn can_transition_to(self, next: AgentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Init, Self::Running)
                | (Self::Init, Self::Error)
                | (Self::Running, Self::Done)
                | (Self::Running, Self::Error)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

/// One agent assignment inside a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowAgent {
    pub id: String,
    /// Name of the registered [`Agent`](crate::agent::Agent) that runs this task.
    pub name: String,
    pub task: String,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<WorkflowNode>,
    /// `Some(false)` keeps this agent out of parallel stages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parallel: Option<bool>,
    #[serde(default)]
    pub status: AgentStatus,
}

impl WorkflowAgent {
    pub fn new(id: impl Into<String>, name: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            task: task.into(),
            depends_on: Vec::new(),
            nodes: Vec::new(),
            parallel: None,
            status: AgentStatus::Init,
        }
    }

    pub fn with_depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_node(mut self, node: WorkflowNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = Some(parallel);
        self
    }

    pub fn set_status(&mut self, next: AgentStatus) -> Result<(), HarperError> {
        if !self.status.can_transition_to(next) {
            return Err(HarperError::InvalidState(format!(
                "agent '{}' cannot move from {} to {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        Ok(())
    }

    /// Whether any node reads or writes shared variables.
    pub fn uses_variables(&self) -> bool {
        self.nodes.iter().any(WorkflowNode::uses_variables)
    }

    pub fn has_for_each(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, WorkflowNode::ForEach { .. }))
    }

    pub fn has_watch(&self) -> bool {
        self.nodes.iter().any(|n| matches!(n, WorkflowNode::Watch { .. }))
    }
}

/// A task decomposed into agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub task_id: String,
    pub name: String,
    #[serde(default)]
    pub thought: String,
    #[serde(default)]
    pub agents: Vec<WorkflowAgent>,
    /// The user's original request, when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_prompt: Option<String>,
    #[serde(default)]
    pub modified: bool,
}

impl Workflow {
    pub fn new(task_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            name: name.into(),
            thought: String::new(),
            agents: Vec::new(),
            task_prompt: None,
            modified: false,
        }
    }

    pub fn with_agent(mut self, agent: WorkflowAgent) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn with_task_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.task_prompt = Some(prompt.into());
        self
    }

    pub fn agent(&self, id: &str) -> Option<&WorkflowAgent> {
        self.agents.iter().find(|a| a.id == id)
    }

    pub fn agent_mut(&mut self, id: &str) -> Option<&mut WorkflowAgent> {
        self.agents.iter_mut().find(|a| a.id == id)
    }

    /// The main task as shown to agents.
    pub fn main_task(&self) -> &str {
        self.task_prompt.as_deref().unwrap_or(&self.name)
    }

    /// Structural checks: non-empty unique ids, known dependencies, no
    /// self-dependency. Cycles are caught by [`DependencyGraph::build`].
    pub fn validate(&self) -> Result<(), HarperError> {
        let mut ids = HashSet::new();
        for agent in &self.agents {
            if agent.id.trim().is_empty() {
                return Err(HarperError::InvalidWorkflow(format!(
                    "agent '{}' has an empty id",
                    agent.name
                )));
            }
            if !ids.insert(agent.id.as_str()) {
                return Err(HarperError::InvalidWorkflow(format!(
                    "duplicate agent id '{}'",
                    agent.id
                )));
            }
        }
        for agent in &self.agents {
            for dep in &agent.depends_on {
                if dep == &agent.id {
                    return Err(HarperError::CycleDetected(agent.id.clone()));
                }
                if !ids.contains(dep.as_str()) {
                    return Err(HarperError::InvalidWorkflow(format!(
                        "agent '{}' depends on unknown agent '{}'",
                        agent.id, dep
                    )));
                }
            }
        }
        Ok(())
    }
}
