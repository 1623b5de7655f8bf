//! 分发器（Dispatcher）
//!
//! 将一个事件并发投递给全部匹配的处理器：
//! - 准入窗口：最多 `max_concurrency` 个调用同时在途，任一结束即按注册顺序
//!   准入下一个，直到队列耗尽；
//! - 每次调用可选超时；超时仅停止等待，处理器任务本身不会被强制终止
//!   （结果至多被采纳一次，但执行未必停止）；
//! - 每个处理器可选重试策略，经 `RetryManager` 执行；
//! - 失败隔离：某个处理器耗尽重试不会影响其它处理器，其信封被标记为死信并
//!   交给 `DeadLetterSink`，同时在 `DispatchReport` 中报告，二者各发生一次。
//!
use super::dead_letter::DeadLetterSink;
use super::handler::EventHandler;
use super::subscription::{Subscription, SubscriptionId};
use crate::domain_event::{Event, EventEnvelope};
use crate::error::{DomainError, DomainResult};
use crate::retry::{RetryHistory, RetryManager, RetryPolicy};
use bon::Builder;
use futures_util::{StreamExt, stream};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 单次分发的选项
#[derive(Clone, Debug, Default, Builder)]
pub struct DispatchOptions {
    /// 单次处理器调用的超时
    pub timeout: Option<Duration>,
    /// 同时在途的处理器调用上限，`None` 表示不限
    pub max_concurrency: Option<usize>,
    /// 订阅未声明重试策略时使用；均未设置时只调用一次
    pub default_retry: Option<RetryPolicy>,
}

/// 耗尽重试的处理器
#[derive(Debug)]
pub struct HandlerFailure {
    pub subscription_id: SubscriptionId,
    pub handler: String,
    pub attempts: u32,
    pub error: DomainError,
}

/// 单个事件的分发结果
#[derive(Debug)]
pub struct DispatchReport {
    pub event_id: Uuid,
    pub handlers: usize,
    pub succeeded: usize,
    pub failed: Vec<HandlerFailure>,
    /// 成功写入死信的信封数
    pub dead_lettered: usize,
}

impl DispatchReport {
    fn empty(event: &Event) -> Self {
        Self {
            event_id: event.event_id(),
            handlers: 0,
            succeeded: 0,
            failed: Vec::new(),
            dead_lettered: 0,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// 分发器
pub struct Dispatcher {
    retry_manager: Arc<RetryManager>,
    dead_letter: Arc<dyn DeadLetterSink>,
}

impl Dispatcher {
    pub fn new(retry_manager: Arc<RetryManager>, dead_letter: Arc<dyn DeadLetterSink>) -> Self {
        Self {
            retry_manager,
            dead_letter,
        }
    }

    /// 并发执行全部处理器，返回汇总结果；不会因任何处理器失败而提前返回
    pub async fn dispatch(
        &self,
        event: &Event,
        subscriptions: &[Subscription],
        options: &DispatchOptions,
    ) -> DispatchReport {
        if subscriptions.is_empty() {
            return DispatchReport::empty(event);
        }

        let window = options
            .max_concurrency
            .unwrap_or(subscriptions.len())
            .max(1);

        let outcomes: Vec<Option<(HandlerFailure, bool)>> = stream::iter(subscriptions.iter().cloned())
            .map(|subscription| async move { self.run(event, &subscription, options).await })
            .buffer_unordered(window)
            .collect()
            .await;

        let mut report = DispatchReport::empty(event);
        report.handlers = subscriptions.len();
        for outcome in outcomes {
            match outcome {
                None => report.succeeded += 1,
                Some((failure, dead_lettered)) => {
                    if dead_lettered {
                        report.dead_lettered += 1;
                    }
                    report.failed.push(failure);
                }
            }
        }
        report
    }

    async fn run(
        &self,
        event: &Event,
        subscription: &Subscription,
        options: &DispatchOptions,
    ) -> Option<(HandlerFailure, bool)> {
        let policy = subscription
            .options()
            .retry_policy()
            .or(options.default_retry.as_ref())
            .cloned()
            .unwrap_or_else(RetryPolicy::none);
        let timeout = subscription.options().timeout().or(options.timeout);
        let handler = subscription.handler();

        let (result, history) = self
            .retry_manager
            .execute_with_history(&policy, |_attempt| {
                invoke(handler.clone(), event.clone(), timeout)
            })
            .await;

        let error = result.err()?;
        tracing::warn!(
            handler = subscription.handler_name(),
            subscription = %subscription.id(),
            attempts = history.attempt_count(),
            error = %error,
            "handler failed, routing to dead letter"
        );

        let dead_lettered = self
            .send_dead_letter(event, subscription, &history, &error)
            .await;

        Some((
            HandlerFailure {
                subscription_id: subscription.id(),
                handler: subscription.handler_name().to_string(),
                attempts: history.attempt_count(),
                error,
            },
            dead_lettered,
        ))
    }

    async fn send_dead_letter(
        &self,
        event: &Event,
        subscription: &Subscription,
        history: &RetryHistory,
        error: &DomainError,
    ) -> bool {
        let envelope = history
            .attempts()
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (a.at, e.clone())))
            .fold(EventEnvelope::new(event.clone()), |envelope, (at, err)| {
                envelope.record_attempt(at, err)
            })
            .into_dead_letter(subscription.handler_name(), error.to_string());

        match self.dead_letter.send(envelope).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(
                    handler = subscription.handler_name(),
                    event_id = %event.event_id(),
                    error = %err,
                    "failed to write dead letter"
                );
                false
            }
        }
    }
}

/// 在独立任务中调用处理器；超时后放弃等待，任务继续在后台运行
async fn invoke(
    handler: Arc<dyn EventHandler>,
    event: Event,
    timeout: Option<Duration>,
) -> DomainResult<()> {
    let name = handler.handler_name().to_string();
    let task = tokio::spawn(async move { handler.handle(&event).await });

    let joined = match timeout {
        Some(limit) => match tokio::time::timeout(limit, task).await {
            Ok(joined) => joined,
            Err(_) => {
                tracing::warn!(handler = %name, timeout_ms = limit.as_millis() as u64, "handler timed out");
                return Err(DomainError::Timeout {
                    handler: name,
                    timeout_ms: limit.as_millis() as u64,
                });
            }
        },
        None => task.await,
    };

    joined.map_err(|err| DomainError::event_handler(name, format!("handler task aborted: {err}")))?
}
