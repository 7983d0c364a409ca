use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::VARIABLE_STORAGE;
use crate::error::HarperError;
use crate::tools::{Tool, ToolArguments, ToolExecutionContext, ToolParameters, ToolResult};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum Operation {
    ReadVariable,
    WriteVariable,
    ListAllVariable,
}

#[derive(Debug, Deserialize)]
struct Input {
    operation: Operation,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    value: Option<Value>,
}

/// Reads and writes the run's shared variables.
#[derive(Debug, Clone)]
pub struct VariableStorageTool {
    parameters: ToolParameters,
}

impl VariableStorageTool {
    pub fn new() -> Self {
        let parameters = ToolParameters::object()
            .string_enum(
                "operation",
                "Operation to perform",
                &["read_variable", "write_variable", "list_all_variable"],
                true,
            )
            .string(
                "name",
                "Variable name; several names may be comma separated when reading",
                false,
            )
            .string("value", "Value to store, required when writing", false)
            .build();
        Self { parameters }
    }
}

impl Default for VariableStorageTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for VariableStorageTool {
    fn name(&self) -> &str {
        VARIABLE_STORAGE
    }

    fn description(&self) -> &str {
        "Read, write and list variables shared between the agents of this task."
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
        let input: Input = args.deserialize()?;
        let variables = ctx.agent.context().variables();
        match input.operation {
            Operation::ReadVariable => {
                let names = required_name(&input)?;
                let store = variables.read().await;
                let mut found = serde_json::Map::new();
                let mut missing = Vec::new();
                for name in names.split(',').map(str::trim).filter(|n| !n.is_empty()) {
                    match store.get(name) {
                        Some(value) => {
                            found.insert(name.to_string(), value.clone());
                        }
                        None => missing.push(name),
                    }
                }
                if found.is_empty() {
                    return Ok(ToolResult::error(format!(
                        "Variable not found: {}",
                        missing.join(", ")
                    )));
                }
                Ok(ToolResult::json(&Value::Object(found)))
            }
            Operation::WriteVariable => {
                let name = required_name(&input)?.trim().to_string();
                let value = input.value.ok_or_else(|| {
                    HarperError::InvalidArgument("value is required when writing".into())
                })?;
                variables.write().await.insert(name.clone(), value);
                Ok(ToolResult::text(format!("Variable `{name}` saved")))
            }
            Operation::ListAllVariable => {
                let mut names: Vec<String> = variables.read().await.keys().cloned().collect();
                names.sort();
                Ok(ToolResult::json(&Value::from(names)))
            }
        }
    }
}

fn required_name(input: &Input) -> Result<&str, HarperError> {
    input
        .name
        .as_deref()
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| HarperError::InvalidArgument("name is required".into()))
}
