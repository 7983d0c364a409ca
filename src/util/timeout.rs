//! Cancellation helper shared by model calls, tools and human waits.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::HarperError;

/// Race a future against a cancellation token; cancellation wins ties.
pub async fn with_cancel<T>(
    cancel: &CancellationToken,
    future: impl Future<Output = Result<T, HarperError>>,
) -> Result<T, HarperError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(HarperError::Aborted),
        result = future => result,
    }
}
