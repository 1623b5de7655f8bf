//! 事件总线（EventBus）协议
//!
//! 定义事件发布与订阅的统一抽象。发布先写入事件存储再分发给全部匹配的
//! 处理器；处理器失败只计入报告与死信，不会让发布失败。
//!
use super::dispatcher::{DispatchOptions, DispatchReport};
use super::handler::EventHandler;
use super::subscriber::{EventSubscriber, MethodHandler};
use super::subscription::{SubscribeOptions, SubscriptionId};
use crate::domain_event::Event;
use crate::error::DomainResult;
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use bon::Builder;
use std::sync::Arc;
use std::time::Duration;

/// 事件总线
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 持久化并分发事件；仅当存储写入失败时返回错误
    async fn publish(&self, event: &Event) -> DomainResult<DispatchReport>;

    /// 顺序发布，遇到首个存储失败即停止
    async fn publish_batch(&self, events: &[Event]) -> DomainResult<Vec<DispatchReport>> {
        let mut reports = Vec::with_capacity(events.len());
        for event in events {
            reports.push(self.publish(event).await?);
        }
        Ok(reports)
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> DomainResult<SubscriptionId>;

    /// 取消订阅，返回订阅是否存在
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    fn subscription_count(&self) -> usize;

    /// 按订阅者声明的绑定逐一订阅
    fn register_subscriber<S>(&self, subscriber: Arc<S>) -> DomainResult<Vec<SubscriptionId>>
    where
        S: EventSubscriber,
        Self: Sized,
    {
        S::bindings()
            .into_iter()
            .map(|binding| {
                let handler = Arc::new(MethodHandler::new(
                    binding.name,
                    subscriber.clone(),
                    binding.method,
                ));
                self.subscribe(binding.pattern, handler, binding.options)
            })
            .collect()
    }
}

/// 总线配置
#[derive(Debug, Clone, Default, Builder)]
pub struct EventBusConfig {
    /// 单个事件同时在途的处理器上限
    pub max_concurrency: Option<usize>,
    /// 单次处理器调用超时
    pub handler_timeout: Option<Duration>,
    /// 订阅未声明策略时的默认重试策略
    pub default_retry: Option<RetryPolicy>,
}

impl EventBusConfig {
    pub fn dispatch_options(&self) -> DispatchOptions {
        DispatchOptions {
            timeout: self.handler_timeout,
            max_concurrency: self.max_concurrency,
            default_retry: self.default_retry.clone(),
        }
    }
}
