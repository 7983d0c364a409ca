//! Run-wide and per-agent execution state.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;
use tokio::sync::{OwnedMutexGuard, RwLock};
use tokio_util::sync::CancellationToken;

use super::Agent;
use crate::callback::{CallbackPayload, HumanCallback, StreamCallback, StreamCallbackMessage};
use crate::chain::{AgentChain, Chain};
use crate::config::HarperConfig;
use crate::error::HarperError;
use crate::llm::RetryLanguageModel;
use crate::types::ModelMessage;
use crate::util::usage::UsageTracker;
use crate::workflow::{AgentStatus, Workflow, WorkflowAgent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// State shared by every agent of one run.
///
/// Build it with the `with_*` methods, then share it behind an `Arc`.
pub struct Context {
    task_id: String,
    config: Arc<HarperConfig>,
    agents: Vec<Arc<Agent>>,
    llm: RetryLanguageModel,
    callback: Option<Arc<dyn StreamCallback>>,
    human: Option<Arc<dyn HumanCallback>>,
    workflow: Mutex<Workflow>,
    chain: Mutex<Chain>,
    variables: RwLock<HashMap<String, Value>>,
    cancel: CancellationToken,
    serial_tools: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    usage: UsageTracker,
}

impl Context {
    pub fn new(workflow: Workflow, llm: RetryLanguageModel) -> Self {
        let chain = Chain::new(workflow.main_task());
        Self {
            task_id: workflow.task_id.clone(),
            config: Arc::new(HarperConfig::default()),
            agents: Vec::new(),
            llm,
            callback: None,
            human: None,
            workflow: Mutex::new(workflow),
            chain: Mutex::new(chain),
            variables: RwLock::new(HashMap::new()),
            cancel: CancellationToken::new(),
            serial_tools: Mutex::new(HashMap::new()),
            usage: UsageTracker::new(),
        }
    }

    /// Replace the run configuration. `max_retry_num` becomes the attempt
    /// budget of every model call.
    pub fn with_config(mut self, config: HarperConfig) -> Self {
        self.llm = self.llm.with_max_attempts(config.max_retry_num);
        self.config = Arc::new(config);
        self
    }

    pub fn with_agent(mut self, agent: Agent) -> Self {
        self.agents.push(Arc::new(agent));
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn StreamCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_human(mut self, human: Arc<dyn HumanCallback>) -> Self {
        self.human = Some(human);
        self
    }

    /// Seed a shared variable before the run starts.
    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.get_mut().insert(name.into(), value);
        self
    }

    /// Tie this run to an outer cancellation scope.
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn config(&self) -> &HarperConfig {
        &self.config
    }

    /// Registered agent with the given name.
    pub fn agent(&self, name: &str) -> Option<Arc<Agent>> {
        self.agents.iter().find(|a| a.name() == name).cloned()
    }

    pub fn llm(&self) -> &RetryLanguageModel {
        &self.llm
    }

    pub fn human(&self) -> Option<&Arc<dyn HumanCallback>> {
        self.human.as_ref()
    }

    /// Snapshot of the workflow, statuses included.
    pub fn workflow(&self) -> Workflow {
        lock(&self.workflow).clone()
    }

    pub fn workflow_agent(&self, index: usize) -> Option<WorkflowAgent> {
        lock(&self.workflow).agents.get(index).cloned()
    }

    pub fn update_agent_status(&self, agent_id: &str, status: AgentStatus) -> Result<(), HarperError> {
        let mut workflow = lock(&self.workflow);
        let agent = workflow.agent_mut(agent_id).ok_or_else(|| {
            HarperError::InvalidWorkflow(format!("unknown agent id '{agent_id}'"))
        })?;
        agent.set_status(status)
    }

    pub fn chain(&self) -> Chain {
        lock(&self.chain).clone()
    }

    pub fn push_chain(&self, entry: AgentChain) {
        lock(&self.chain).push(entry);
    }

    pub fn set_chain_result(&self, agent_id: &str, result: &str) {
        lock(&self.chain).set_result(agent_id, result);
    }

    pub fn variables(&self) -> &RwLock<HashMap<String, Value>> {
        &self.variables
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Request a cooperative stop of every agent of the run.
    pub fn abort(&self) {
        tracing::info!(task_id = %self.task_id, "run aborted");
        self.cancel.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn check_aborted(&self) -> Result<(), HarperError> {
        if self.is_aborted() {
            return Err(HarperError::Aborted);
        }
        Ok(())
    }

    /// Held while a tool that cannot run concurrently executes. Calls of
    /// the same tool queue up across agents; other tools are not blocked.
    pub async fn serial_tool_lock(&self, tool_name: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = lock(&self.serial_tools);
            Arc::clone(slots.entry(tool_name.to_string()).or_default())
        };
        slot.lock_owned().await
    }

    pub fn usage(&self) -> &UsageTracker {
        &self.usage
    }

    /// Deliver an event to the callback, if one is installed.
    pub async fn emit(&self, agent_name: &str, node_id: Option<&str>, payload: CallbackPayload) {
        let Some(callback) = &self.callback else {
            return;
        };
        callback
            .on_message(StreamCallbackMessage {
                task_id: self.task_id.clone(),
                agent_name: agent_name.to_string(),
                node_id: node_id.map(str::to_string),
                payload,
            })
            .await;
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("task_id", &self.task_id)
            .field("agents", &self.agents.iter().map(|a| a.name()).collect::<Vec<_>>())
            .field("llm", &self.llm)
            .field("aborted", &self.is_aborted())
            .finish()
    }
}

/// State of one agent while it works on its workflow task.
pub struct AgentContext {
    context: Arc<Context>,
    agent: Arc<Agent>,
    workflow_agent: WorkflowAgent,
    cancel: CancellationToken,
    done_nodes: Mutex<BTreeSet<u64>>,
    /// Conversation with the model, owned by the agent loop.
    pub messages: Vec<ModelMessage>,
}

impl AgentContext {
    pub fn new(context: Arc<Context>, agent: Arc<Agent>, workflow_agent: WorkflowAgent) -> Self {
        let cancel = context.cancellation_token().child_token();
        Self {
            context,
            agent,
            workflow_agent,
            cancel,
            done_nodes: Mutex::new(BTreeSet::new()),
            messages: Vec::new(),
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn workflow_agent(&self) -> &WorkflowAgent {
        &self.workflow_agent
    }

    pub fn config(&self) -> &HarperConfig {
        self.context.config()
    }

    /// Cancelled when the run is aborted.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn check_aborted(&self) -> Result<(), HarperError> {
        if self.cancel.is_cancelled() {
            return Err(HarperError::Aborted);
        }
        Ok(())
    }

    /// Models this agent may use.
    pub fn llm(&self) -> RetryLanguageModel {
        match self.agent.llms() {
            [] => self.context.llm().clone(),
            names => self.context.llm().select(names),
        }
    }

    pub fn mark_nodes_done(&self, ids: &[u64]) {
        lock(&self.done_nodes).extend(ids.iter().copied());
    }

    pub fn done_nodes(&self) -> Vec<u64> {
        lock(&self.done_nodes).iter().copied().collect()
    }

    pub async fn emit(&self, payload: CallbackPayload) {
        self.context
            .emit(self.agent.name(), Some(&self.workflow_agent.id), payload)
            .await;
    }
}

impl std::fmt::Debug for AgentContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentContext")
            .field("task_id", &self.context.task_id())
            .field("agent", &self.agent.name())
            .field("node", &self.workflow_agent.id)
            .field("messages", &self.messages.len())
            .finish()
    }
}
