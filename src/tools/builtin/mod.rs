//! Tools the runtime adds on its own.

mod human_interact;
mod snapshot;
mod variable_storage;

pub use human_interact::HumanInteractTool;
pub use snapshot::TaskSnapshotTool;
pub use variable_storage::VariableStorageTool;

pub const TASK_SNAPSHOT: &str = "task_snapshot";
pub const VARIABLE_STORAGE: &str = "variable_storage";
pub const HUMAN_INTERACT: &str = "human_interact";
