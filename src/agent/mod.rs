//! Agents and the state they run with.

pub mod agent;
pub mod context;
pub(crate) mod llm;
pub mod prompt;
mod runner;
mod tooling;

pub use agent::Agent;
pub use context::{AgentContext, Context};
pub use tooling::{convert_tool_result, TOOL_OUTPUT_VARIABLE_PREFIX};
