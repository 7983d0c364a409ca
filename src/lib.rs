//! Harper — multi-agent workflow orchestration.
//!
//! A [`Workflow`](workflow::Workflow) names agents and the agents they depend
//! on. [`scheduler::compile`] turns it into stages, and a
//! [`Scheduler`](scheduler::Scheduler) runs each stage's agents (concurrently
//! when configured) through a react loop against a host-supplied
//! [`LanguageModel`](llm::LanguageModel). Long conversations are kept inside
//! the context window by the [`memory`] module.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use harper::prelude::*;
//!
//! # async fn example(model: Arc<dyn LanguageModel>) {
//! let workflow = Workflow::new("task-1", "Summarise the news")
//!     .with_agent(WorkflowAgent::new("a", "Browser", "Collect today's headlines"))
//!     .with_agent(WorkflowAgent::new("b", "Writer", "Write a summary").with_depends_on(["a"]));
//!
//! let context = Context::new(workflow, RetryLanguageModel::new(vec![model], 3))
//!     .with_agent(Agent::new("Browser", "Browses the web"))
//!     .with_agent(Agent::new("Writer", "Writes prose"));
//!
//! let result = Scheduler::new().execute(Arc::new(context)).await;
//! println!("{:?}: {}", result.stop_reason, result.result);
//! # }
//! ```

pub mod agent;
pub mod callback;
pub mod chain;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod prelude;
pub mod scheduler;
pub mod tools;
pub mod types;
pub mod util;
pub mod workflow;
