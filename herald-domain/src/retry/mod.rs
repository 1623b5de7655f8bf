//! 重试（Retry）
//!
//! - `RetryPolicy`：不可变的重试策略，负责纯函数式的退避/抖动计算；
//! - `RetryConfig`：可反序列化的配置形态；
//! - `RetryManager`：按策略执行异步操作并记录尝试历史。
//!
mod policy;

#[cfg(feature = "eventing")]
mod manager;

pub use policy::{BackoffKind, DEFAULT_JITTER, RetryConfig, RetryPolicy, ShouldRetry};

#[cfg(feature = "eventing")]
pub use manager::{RetryAttempt, RetryHistory, RetryManager, RetrySummary};
