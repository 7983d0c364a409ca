//! Execution plan compiled from a workflow, and the chain of agent results.

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::util::text::sub;
use crate::workflow::{Workflow, WorkflowAgent};

/// One agent slot of a stage.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalAgentNode {
    /// Index into `Workflow::agents`.
    pub agent: usize,
    pub result: Option<String>,
}

impl NormalAgentNode {
    pub fn new(agent: usize) -> Self {
        Self {
            agent,
            result: None,
        }
    }
}

/// Agents of one stage that run concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct ParallelAgentNode {
    pub agents: Vec<NormalAgentNode>,
    pub result: Option<String>,
}

/// A stage of the plan.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentNode {
    Normal(NormalAgentNode),
    Parallel(ParallelAgentNode),
}

impl AgentNode {
    pub fn result(&self) -> Option<&str> {
        match self {
            Self::Normal(node) => node.result.as_deref(),
            Self::Parallel(node) => node.result.as_deref(),
        }
    }

    /// Workflow indices of the agents in this stage.
    pub fn agent_indices(&self) -> Vec<usize> {
        match self {
            Self::Normal(node) => vec![node.agent],
            Self::Parallel(node) => node.agents.iter().map(|n| n.agent).collect(),
        }
    }
}

/// Stages stored in run order; stage `i` is followed by stage `i + 1`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    stages: Vec<AgentNode>,
}

impl ExecutionPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: AgentNode) {
        self.stages.push(node);
    }

    /// First stage, if any.
    pub fn head(&self) -> Option<usize> {
        (!self.stages.is_empty()).then_some(0)
    }

    /// Successor of `stage`.
    pub fn next(&self, stage: usize) -> Option<usize> {
        let next = stage + 1;
        (next < self.stages.len()).then_some(next)
    }

    pub fn stage(&self, index: usize) -> Option<&AgentNode> {
        self.stages.get(index)
    }

    pub fn stage_mut(&mut self, index: usize) -> Option<&mut AgentNode> {
        self.stages.get_mut(index)
    }

    pub fn stages(&self) -> &[AgentNode] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Result of the final stage.
    pub fn last_result(&self) -> Option<&str> {
        self.stages.last().and_then(AgentNode::result)
    }

    /// One-line rendering such as `a -> [b | c] -> d`.
    pub fn describe(&self, workflow: &Workflow) -> String {
        let label = |index: usize| {
            workflow
                .agents
                .get(index)
                .map(|a| a.id.clone())
                .unwrap_or_else(|| format!("#{index}"))
        };
        let mut out = String::new();
        for (i, stage) in self.stages.iter().enumerate() {
            if i > 0 {
                out.push_str(" -> ");
            }
            match stage {
                AgentNode::Normal(node) => out.push_str(&label(node.agent)),
                AgentNode::Parallel(node) => {
                    let members: Vec<String> = node.agents.iter().map(|n| label(n.agent)).collect();
                    let _ = write!(out, "[{}]", members.join(" | "));
                }
            }
        }
        out
    }
}

/// Result of one agent as recorded for later agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentChain {
    pub agent: WorkflowAgent,
    pub agent_result: Option<String>,
}

impl AgentChain {
    pub fn new(agent: WorkflowAgent) -> Self {
        Self {
            agent,
            agent_result: None,
        }
    }
}

/// Run-wide record of started agents, in start order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chain {
    pub task_prompt: String,
    pub agents: Vec<AgentChain>,
}

/// Characters of each prior result shown to a dependant agent.
pub const PRE_TASK_RESULT_LENGTH: usize = 600;

impl Chain {
    pub fn new(task_prompt: impl Into<String>) -> Self {
        Self {
            task_prompt: task_prompt.into(),
            agents: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: AgentChain) {
        self.agents.push(entry);
    }

    pub fn set_result(&mut self, agent_id: &str, result: impl Into<String>) {
        if let Some(entry) = self.agents.iter_mut().rev().find(|e| e.agent.id == agent_id) {
            entry.agent_result = Some(result.into());
        }
    }

    /// Finished results of agents other than `agent_id`, labelled by task and
    /// truncated.
    pub fn prior_results(&self, agent_id: &str) -> Vec<(String, String)> {
        self.agents
            .iter()
            .filter(|entry| entry.agent.id != agent_id)
            .filter_map(|entry| {
                entry.agent_result.as_ref().map(|result| {
                    let label = if entry.agent.task.trim().is_empty() {
                        entry.agent.name.clone()
                    } else {
                        entry.agent.task.clone()
                    };
                    (
                        label,
                        sub(result, PRE_TASK_RESULT_LENGTH, true),
                    )
                })
            })
            .collect()
    }
}
