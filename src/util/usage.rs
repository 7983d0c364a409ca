//! Usage tracking across the model calls of a run.

use std::sync::{Arc, RwLock};

use crate::types::Usage;

/// Tracks cumulative token usage across every agent of a run.
#[derive(Clone, Default)]
pub struct UsageTracker {
    inner: Arc<RwLock<UsageTrackerInner>>,
}

#[derive(Default)]
struct UsageTrackerInner {
    total_usage: Usage,
    generation_count: u64,
}

impl UsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record usage from one model call.
    pub fn record(&self, usage: &Usage) {
        let mut inner = self.inner.write().unwrap_or_else(|p| p.into_inner());
        inner.total_usage.merge(usage);
        inner.generation_count += 1;
    }

    pub fn total_usage(&self) -> Usage {
        self.inner.read().unwrap_or_else(|p| p.into_inner()).total_usage
    }

    /// Number of model calls recorded.
    pub fn generation_count(&self) -> u64 {
        self.inner
            .read()
            .unwrap_or_else(|p| p.into_inner())
            .generation_count
    }
}
