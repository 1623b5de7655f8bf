//! 显式订阅声明（EventSubscriber）
//!
//! 消费方以静态列表声明 `(模式, 方法)` 绑定，在构造后一次性注册到总线，
//! 不依赖任何运行时反射。
//!
use super::handler::EventHandler;
use super::subscription::SubscribeOptions;
use crate::domain_event::Event;
use crate::error::DomainResult;
use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

pub type HandlerFuture = Pin<Box<dyn Future<Output = DomainResult<()>> + Send>>;

/// 订阅方法签名
pub type SubscriberMethod<S> = fn(Arc<S>, Event) -> HandlerFuture;

/// 一条 `(模式, 方法)` 绑定
pub struct SubscriberBinding<S> {
    pub pattern: &'static str,
    pub name: &'static str,
    pub method: SubscriberMethod<S>,
    pub options: SubscribeOptions,
}

impl<S> SubscriberBinding<S> {
    pub fn new(pattern: &'static str, name: &'static str, method: SubscriberMethod<S>) -> Self {
        Self {
            pattern,
            name,
            method,
            options: SubscribeOptions::default(),
        }
    }

    pub fn with_options(self, options: SubscribeOptions) -> Self {
        Self { options, ..self }
    }
}

/// 事件订阅者：声明自身需要注册的全部绑定
pub trait EventSubscriber: Send + Sync + Sized + 'static {
    fn bindings() -> Vec<SubscriberBinding<Self>>;
}

/// 将订阅者的某个方法适配为处理器
pub struct MethodHandler<S> {
    name: &'static str,
    target: Arc<S>,
    method: SubscriberMethod<S>,
}

impl<S> MethodHandler<S> {
    pub fn new(name: &'static str, target: Arc<S>, method: SubscriberMethod<S>) -> Self {
        Self {
            name,
            target,
            method,
        }
    }
}

#[async_trait]
impl<S> EventHandler for MethodHandler<S>
where
    S: Send + Sync + 'static,
{
    fn handler_name(&self) -> &str {
        self.name
    }

    async fn handle(&self, event: &Event) -> DomainResult<()> {
        (self.method)(self.target.clone(), event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eventing::{EventBus, InMemoryDeadLetterQueue, InMemoryEventBus};
    use crate::persist::InMemoryEventStore;
    use std::sync::Mutex;

    #[derive(Default)]
    struct AuditLog {
        entries: Mutex<Vec<String>>,
    }

    impl AuditLog {
        fn on_task(self: Arc<Self>, event: Event) -> HandlerFuture {
            Box::pin(async move {
                self.entries
                    .lock()
                    .unwrap()
                    .push(format!("task:{}", event.event_type()));
                Ok(())
            })
        }

        fn on_any(self: Arc<Self>, event: Event) -> HandlerFuture {
            Box::pin(async move {
                self.entries
                    .lock()
                    .unwrap()
                    .push(format!("any:{}", event.event_type()));
                Ok(())
            })
        }
    }

    impl EventSubscriber for AuditLog {
        fn bindings() -> Vec<SubscriberBinding<Self>> {
            vec![
                SubscriberBinding::new("task.*", "audit.task", Self::on_task),
                SubscriberBinding::new("**", "audit.any", Self::on_any),
            ]
        }
    }

    #[tokio::test]
    async fn registers_every_binding() {
        let bus = InMemoryEventBus::builder()
            .event_store(Arc::new(InMemoryEventStore::new()))
            .dead_letter_sink(Arc::new(InMemoryDeadLetterQueue::new()))
            .build();
        let audit = Arc::new(AuditLog::default());

        let ids = bus.register_subscriber(audit.clone()).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(bus.subscription_count(), 2);

        let event = Event::builder()
            .event_type("task.created")
            .aggregate_id("t-1")
            .aggregate_type("task")
            .build()
            .unwrap();
        bus.publish(&event).await.unwrap();

        let mut entries = audit.entries.lock().unwrap().clone();
        entries.sort();
        assert_eq!(entries, vec!["any:task.created", "task:task.created"]);
    }
}
