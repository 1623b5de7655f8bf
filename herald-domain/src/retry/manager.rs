use super::policy::RetryPolicy;
use crate::error::DomainResult;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

/// 单次尝试记录
#[derive(Debug, Clone)]
pub struct RetryAttempt {
    /// 第几次尝试（从 1 开始）
    pub attempt: u32,
    pub at: DateTime<Utc>,
    /// 失败原因；成功时为 `None`
    pub error: Option<String>,
    /// 本次失败后的退避时长；最后一次尝试为 `None`
    pub delay: Option<Duration>,
}

/// 一次 `execute_with_history` 的完整尝试历史
#[derive(Debug, Clone, Default)]
pub struct RetryHistory {
    attempts: Vec<RetryAttempt>,
    elapsed: Duration,
    succeeded: bool,
}

/// 尝试历史摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrySummary {
    pub attempts: u32,
    pub total_elapsed: Duration,
    pub succeeded: bool,
    pub final_error: Option<String>,
}

impl RetryHistory {
    pub fn attempts(&self) -> &[RetryAttempt] {
        &self.attempts
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    pub fn summary(&self) -> RetrySummary {
        RetrySummary {
            attempts: self.attempt_count(),
            total_elapsed: self.elapsed,
            succeeded: self.succeeded,
            final_error: if self.succeeded {
                None
            } else {
                self.attempts.last().and_then(|a| a.error.clone())
            },
        }
    }
}

/// 重试执行器
///
/// 按策略循环执行操作：成功立即返回；失败时若已达上限或判定不可重试则立刻
/// 返回最后一次的错误（不做等待），否则按退避时长挂起后继续。
/// 错误原样透出，从不吞掉。
#[derive(Debug, Clone, Default)]
pub struct RetryManager {
    default_policy: RetryPolicy,
}

impl RetryManager {
    pub fn new(default_policy: RetryPolicy) -> Self {
        Self { default_policy }
    }

    pub fn default_policy(&self) -> &RetryPolicy {
        &self.default_policy
    }

    /// 使用缺省策略执行
    pub async fn execute<T, F, Fut>(&self, operation: F) -> DomainResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        self.execute_with_retry(&self.default_policy, operation)
            .await
    }

    /// `operation` 接收当前尝试序号（从 1 开始）
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        operation: F,
    ) -> DomainResult<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        self.execute_with_history(policy, operation).await.0
    }

    /// 同 `execute_with_retry`，并返回完整的尝试历史
    pub async fn execute_with_history<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        mut operation: F,
    ) -> (DomainResult<T>, RetryHistory)
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DomainResult<T>>,
    {
        let started = Instant::now();
        let max_attempts = policy.effective_attempts();
        let mut attempts = Vec::new();
        let mut attempt = 1;

        loop {
            let at = Utc::now();
            match operation(attempt).await {
                Ok(value) => {
                    attempts.push(RetryAttempt {
                        attempt,
                        at,
                        error: None,
                        delay: None,
                    });
                    let history = RetryHistory {
                        attempts,
                        elapsed: started.elapsed(),
                        succeeded: true,
                    };
                    return (Ok(value), history);
                }
                Err(err) => {
                    if attempt >= max_attempts || !policy.should_retry(&err, attempt) {
                        tracing::debug!(attempt, error = %err, "retries exhausted");
                        attempts.push(RetryAttempt {
                            attempt,
                            at,
                            error: Some(err.to_string()),
                            delay: None,
                        });
                        let history = RetryHistory {
                            attempts,
                            elapsed: started.elapsed(),
                            succeeded: false,
                        };
                        return (Err(err), history);
                    }

                    let delay = policy.delay_for(attempt);
                    tracing::debug!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "attempt failed, backing off"
                    );
                    attempts.push(RetryAttempt {
                        attempt,
                        at,
                        error: Some(err.to_string()),
                        delay: Some(delay),
                    });

                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
