//! Utility modules: retry, timeout, usage tracking, text helpers.

pub mod retry;
pub mod text;
pub mod timeout;
pub mod usage;
