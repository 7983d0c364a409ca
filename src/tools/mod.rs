//! Tool system for function calling.

pub mod arguments;
pub mod builtin;
pub mod registry;
pub mod result;
pub mod tool;
pub mod types;

pub use arguments::ToolArguments;
pub use registry::{convert_tools, get_tool, merge_tools, NamedTool, ToolDefinition};
pub use result::ToolResult;
pub use tool::{AgentTool, Tool, ToolCallInfo, ToolExecutionContext};
pub use types::{ParameterBuilder, ToolParameters};
