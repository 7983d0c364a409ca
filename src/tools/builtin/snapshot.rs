use async_trait::async_trait;
use serde_json::json;

use super::TASK_SNAPSHOT;
use crate::error::HarperError;
use crate::tools::{Tool, ToolArguments, ToolExecutionContext, ToolParameters, ToolResult};

/// Records finished nodes and returns the model's summary of the task so far.
///
/// Only offered to the model during history compression.
#[derive(Debug, Clone)]
pub struct TaskSnapshotTool {
    parameters: ToolParameters,
}

impl TaskSnapshotTool {
    pub fn new() -> Self {
        let parameters = ToolParameters::object()
            .array(
                "doneIds",
                "Ids of the task nodes that are already completed",
                json!({"type": "integer"}),
                true,
            )
            .string(
                "taskSnapshot",
                "Snapshot of the current task: key information gathered and what remains to be done",
                true,
            )
            .build();
        Self { parameters }
    }
}

impl Default for TaskSnapshotTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for TaskSnapshotTool {
    fn name(&self) -> &str {
        TASK_SNAPSHOT
    }

    fn description(&self) -> &str {
        "Save a snapshot of the current task, keeping only key information and node completion status."
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext<'_>,
    ) -> Result<ToolResult, HarperError> {
        let done_ids = args.get_u64_array("doneIds").unwrap_or_default();
        let snapshot = args.get_str("taskSnapshot")?;
        ctx.agent.mark_nodes_done(&done_ids);

        let mut text = format!("Current task snapshot: {snapshot}");
        let done = ctx.agent.done_nodes();
        if !done.is_empty() {
            let ids: Vec<String> = done.iter().map(u64::to_string).collect();
            text.push_str(&format!("\nCompleted node ids: {}", ids.join(", ")));
        }
        Ok(ToolResult::text(text))
    }
}
