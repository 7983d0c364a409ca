//! Ordered fallback across language models.

use std::sync::Arc;

use futures::stream::BoxStream;

use super::{LanguageModel, LlmRequest, LlmResponse, StreamPart};
use crate::error::HarperError;
use crate::util::retry::RetryPolicy;
use crate::util::timeout::with_cancel;

/// Tries each model in order; each model gets the full retry budget for
/// retryable errors before the next one is tried.
#[derive(Clone)]
pub struct RetryLanguageModel {
    models: Vec<Arc<dyn LanguageModel>>,
    policy: RetryPolicy,
}

impl RetryLanguageModel {
    pub fn new(models: Vec<Arc<dyn LanguageModel>>, max_retry_num: u32) -> Self {
        Self {
            models,
            policy: RetryPolicy::with_max_attempts(max_retry_num),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Keep the backoff schedule but change how many attempts each model gets.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts.max(1);
        self
    }

    pub fn model_names(&self) -> Vec<&str> {
        self.models.iter().map(|m| m.name()).collect()
    }

    /// Restrict to the named models, keeping their listed order. Falls back to
    /// every model when none match.
    pub fn select(&self, names: &[String]) -> Self {
        let models: Vec<_> = names
            .iter()
            .filter_map(|name| self.models.iter().find(|m| m.name() == name).cloned())
            .collect();
        if models.is_empty() {
            return self.clone();
        }
        Self {
            models,
            policy: self.policy.clone(),
        }
    }

    pub async fn generate(&self, request: &LlmRequest) -> Result<LlmResponse, HarperError> {
        let mut last_error = None;
        for model in &self.models {
            let attempt = self
                .policy
                .execute(|| with_cancel(&request.abort, model.generate(request)))
                .await;
            match attempt {
                Ok(response) => return Ok(response),
                Err(error) if error.is_aborted() => return Err(error),
                Err(error) => {
                    tracing::warn!(model = model.name(), error = %error, "model call failed");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(no_models))
    }

    /// Open a stream on the first model that accepts the request. Errors after
    /// the stream is open are not retried.
    pub async fn stream(
        &self,
        request: &LlmRequest,
    ) -> Result<(String, BoxStream<'static, Result<StreamPart, HarperError>>), HarperError> {
        let mut last_error = None;
        for model in &self.models {
            let attempt = self
                .policy
                .execute(|| with_cancel(&request.abort, model.stream(request)))
                .await;
            match attempt {
                Ok(stream) => return Ok((model.name().to_string(), stream)),
                Err(error) if error.is_aborted() => return Err(error),
                Err(error) => {
                    tracing::warn!(model = model.name(), error = %error, "model stream failed to open");
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(no_models))
    }
}

fn no_models() -> HarperError {
    HarperError::Configuration("no language model configured".into())
}

impl std::fmt::Debug for RetryLanguageModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryLanguageModel")
            .field("models", &self.model_names())
            .field("policy", &self.policy)
            .finish()
    }
}
