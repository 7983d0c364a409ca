use async_trait::async_trait;
use serde_json::json;

use super::HUMAN_INTERACT;
use crate::callback::HelpType;
use crate::error::HarperError;
use crate::tools::{Tool, ToolArguments, ToolExecutionContext, ToolParameters, ToolResult};

/// Asks the person running the task to confirm, type, choose or step in.
#[derive(Debug, Clone)]
pub struct HumanInteractTool {
    parameters: ToolParameters,
}

impl HumanInteractTool {
    pub fn new() -> Self {
        let parameters = ToolParameters::object()
            .string_enum(
                "interact_type",
                "confirm: yes/no question; input: free text; select: pick from options; request_help: ask a person to take over",
                &["confirm", "input", "select", "request_help"],
                true,
            )
            .string("prompt", "Question or explanation shown to the person", true)
            .array(
                "select_options",
                "Options to choose from, for select",
                json!({"type": "string"}),
                false,
            )
            .boolean("select_multiple", "Whether several options may be chosen", false)
            .string_enum(
                "help_type",
                "Kind of help needed, for request_help",
                &["request_login", "request_assistance"],
                false,
            )
            .build();
        Self { parameters }
    }
}

impl Default for HumanInteractTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for HumanInteractTool {
    fn name(&self) -> &str {
        HUMAN_INTERACT
    }

    fn description(&self) -> &str {
        "Interact with the person running the task: confirm dangerous actions, ask for input or a choice, or request help with logins and verification."
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    fn supports_parallel_calls(&self) -> bool {
        false
    }

    async fn execute(
        &self,
        args: &ToolArguments,
        ctx: &ToolExecutionContext<'_>,
    ) -> Result<ToolResult, HarperError> {
        let Some(human) = ctx.agent.context().human() else {
            return Ok(ToolResult::error("human interaction is not available"));
        };
        let prompt = args.get_str("prompt")?;
        let reply = match args.get_str("interact_type")? {
            "confirm" => json!({"confirmed": human.confirm(ctx.agent, prompt).await?}),
            "input" => json!({"input": human.input(ctx.agent, prompt).await?}),
            "select" => {
                let options = args.get_str_array("select_options").unwrap_or_default();
                let multiple = args.get_bool_opt("select_multiple").unwrap_or(false);
                json!({"selected": human.select(ctx.agent, prompt, &options, multiple).await?})
            }
            "request_help" => {
                let help_type = args
                    .get_str_opt("help_type")
                    .and_then(|t| t.parse().ok())
                    .unwrap_or(HelpType::RequestAssistance);
                json!({"resolved": human.help(ctx.agent, help_type, prompt).await?})
            }
            other => {
                return Err(HarperError::InvalidArgument(format!(
                    "unknown interact_type: {other}"
                )))
            }
        };
        Ok(ToolResult::json(&reply))
    }
}
