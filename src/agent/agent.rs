//! Agent definition and entry point of its react loop.

use std::sync::Arc;

use super::context::{AgentContext, Context};
use super::prompt::{build_system_prompt, build_user_prompt};
use super::runner::run_react_loop;
use crate::error::HarperError;
use crate::tools::builtin::{HumanInteractTool, VariableStorageTool};
use crate::tools::registry::merge_tools;
use crate::tools::Tool;
use crate::types::ModelMessage;
use crate::workflow::WorkflowAgent;

/// A named worker with its own tools, matched to workflow agents by name.
#[derive(Clone)]
pub struct Agent {
    name: String,
    description: String,
    tools: Vec<Arc<dyn Tool>>,
    llms: Vec<String>,
    parallel_tool_calls: bool,
    system_prompt: Option<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            tools: Vec::new(),
            llms: Vec::new(),
            parallel_tool_calls: true,
            system_prompt: None,
        }
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn with_tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Restrict the agent to these model names, in preference order.
    pub fn with_llms<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.llms = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_parallel_tool_calls(mut self, enabled: bool) -> Self {
        self.parallel_tool_calls = enabled;
        self
    }

    /// Extra instructions appended to the generated system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn tools(&self) -> &[Arc<dyn Tool>] {
        &self.tools
    }

    pub fn llms(&self) -> &[String] {
        &self.llms
    }

    pub fn can_parallel_tool_calls(&self) -> bool {
        self.parallel_tool_calls
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    /// Built-in tools this task needs, overridable by the agent's own tools.
    fn active_tools(&self, context: &Context, workflow_agent: &WorkflowAgent) -> Vec<Arc<dyn Tool>> {
        let mut system: Vec<Arc<dyn Tool>> = Vec::new();
        if context.human().is_some() {
            system.push(Arc::new(HumanInteractTool::new()));
        }
        if workflow_agent.uses_variables() {
            system.push(Arc::new(VariableStorageTool::new()));
        }
        merge_tools(system, self.tools.clone())
    }

    /// Work on `workflow_agent` until the model stops calling tools.
    pub async fn run(
        self: Arc<Self>,
        context: Arc<Context>,
        workflow_agent: WorkflowAgent,
    ) -> Result<String, HarperError> {
        let tools = self.active_tools(&context, &workflow_agent);
        let mut agent_context = AgentContext::new(context, self, workflow_agent);
        let system = build_system_prompt(&agent_context, &tools);
        let user = build_user_prompt(&agent_context);
        agent_context.messages = vec![ModelMessage::system(system), ModelMessage::user(user)];
        run_react_loop(&mut agent_context, &tools).await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("tools", &self.tools.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("llms", &self.llms)
            .field("parallel_tool_calls", &self.parallel_tool_calls)
            .finish()
    }
}
