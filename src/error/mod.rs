//! Error types for Harper.

pub mod category;

pub use category::{ErrorCategory, RecoverySuggestion};

use thiserror::Error;

/// Primary error type for all Harper operations.
#[derive(Error, Debug)]
pub enum HarperError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Language model error: {model} — {message}")]
    Llm {
        model: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Rate limited: retry after {retry_after_ms:?}ms")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Tool execution error: {tool_name} — {message}")]
    ToolExecution { tool_name: String, message: String },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Cycle detected in workflow at agent '{0}'")]
    CycleDetected(String),

    #[error("Agent '{agent}' failed: {message}")]
    AgentFailed { agent: String, message: String },

    #[error("Agent '{0}' exceeded the maximum number of reasoning iterations")]
    MaxIterations(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Task aborted")]
    Aborted,
}

impl HarperError {
    /// Create a language model error without an underlying source.
    pub fn llm(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Llm {
            model: model.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create an API error.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Create a tool execution error.
    pub fn tool(tool_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolExecution {
            tool_name: tool_name.into(),
            message: message.into(),
        }
    }

    /// Classify this error into a category.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::RateLimited { .. } => ErrorCategory::RateLimit,
            Self::Network(_) | Self::Stream(_) => ErrorCategory::Network,
            Self::Timeout(_) => ErrorCategory::Timeout,
            Self::Configuration(_) | Self::Toml(_) => ErrorCategory::Configuration,
            Self::Serialization(_) => ErrorCategory::Serialization,
            Self::Api { status, .. } => match status {
                401 | 403 => ErrorCategory::Authentication,
                429 => ErrorCategory::RateLimit,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Api,
            },
            Self::Llm { .. } => ErrorCategory::Api,
            Self::ToolExecution { .. } | Self::ToolNotFound(_) | Self::InvalidArgument(_) => {
                ErrorCategory::ToolExecution
            }
            Self::InvalidWorkflow(_) | Self::CycleDetected(_) => ErrorCategory::Workflow,
            Self::Aborted => ErrorCategory::Aborted,
            _ => ErrorCategory::Unknown,
        }
    }

    /// Whether this error is potentially retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.category(),
            ErrorCategory::RateLimit
                | ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::Server
        )
    }

    /// Whether this error is the result of a cooperative abort.
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }

    /// Suggest recovery actions.
    pub fn recovery_suggestion(&self) -> RecoverySuggestion {
        match self.category() {
            ErrorCategory::Authentication => RecoverySuggestion::CheckCredentials,
            ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Server => RecoverySuggestion::RetryWithBackoff,
            ErrorCategory::Timeout => RecoverySuggestion::IncreaseTimeout,
            ErrorCategory::Configuration => RecoverySuggestion::CheckConfiguration,
            ErrorCategory::ToolExecution => RecoverySuggestion::CheckToolImplementation,
            ErrorCategory::Workflow => RecoverySuggestion::FixWorkflow,
            _ => RecoverySuggestion::None,
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, HarperError>;
