//! Context-window management for agent histories.

pub mod compress;
pub mod dedup;
pub mod truncate;

pub use compress::{compress_agent_messages, extract_used_tool, SNAPSHOT_INSTRUCTION};
pub use dedup::remove_duplicate_tool_use;
pub use truncate::handle_large_context_messages;
