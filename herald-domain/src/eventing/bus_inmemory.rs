//! 内存版事件总线（InMemoryEventBus）
//!
//! 进程内发布/订阅实现，满足 `EventBus` 协议：
//! - `publish`：写入事件存储后，经 `Dispatcher` 并发投递给匹配的订阅；
//! - `subscribe`：精确类型走哈希索引，通配模式逐一匹配；
//! - 处理器失败被隔离为死信与失败计数，不影响发布方。
//!
//! 同一调用方顺序发布的事件按顺序分发：前一次 `publish` 返回前（包括其全部
//! 处理器结束），后一事件不会开始分发。
//!
use super::bus::{EventBus, EventBusConfig};
use super::dead_letter::DeadLetterSink;
use super::dispatcher::{DispatchReport, Dispatcher};
use super::handler::EventHandler;
use super::subscription::{SubscribeOptions, Subscription, SubscriptionId, SubscriptionRegistry};
use crate::domain_event::Event;
use crate::error::DomainResult;
use crate::pattern::PatternMatcher;
use crate::persist::EventStore;
use crate::retry::RetryManager;
use async_trait::async_trait;
use bon::bon;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub struct InMemoryEventBus {
    registry: RwLock<SubscriptionRegistry>,
    matcher: Arc<PatternMatcher>,
    event_store: Arc<dyn EventStore>,
    dispatcher: Dispatcher,
    config: EventBusConfig,
    total_events: AtomicU64,
    failed_deliveries: AtomicU64,
}

#[bon]
impl InMemoryEventBus {
    #[builder]
    pub fn new(
        event_store: Arc<dyn EventStore>,
        dead_letter_sink: Arc<dyn DeadLetterSink>,
        #[builder(default)] retry_manager: Arc<RetryManager>,
        #[builder(default)] pattern_matcher: Arc<PatternMatcher>,
        #[builder(default)] config: EventBusConfig,
    ) -> Self {
        Self {
            registry: RwLock::new(SubscriptionRegistry::new()),
            matcher: pattern_matcher,
            event_store,
            dispatcher: Dispatcher::new(retry_manager, dead_letter_sink),
            config,
            total_events: AtomicU64::new(0),
            failed_deliveries: AtomicU64::new(0),
        }
    }
}

impl InMemoryEventBus {
    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    /// 成功持久化的事件总数
    pub fn total_events(&self) -> u64 {
        self.total_events.load(Ordering::Relaxed)
    }

    /// 耗尽重试的处理器调用总数
    pub fn failed_deliveries(&self) -> u64 {
        self.failed_deliveries.load(Ordering::Relaxed)
    }

    /// 持锁仅做模式匹配，过滤谓词在释放锁后执行，谓词内可再次访问总线
    fn matching(&self, event: &Event) -> Vec<Subscription> {
        let mut matched = self
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .matching_patterns(&self.matcher, event);
        matched.retain(|s| s.accepts(event));
        matched
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    #[tracing::instrument(
        skip_all,
        fields(event_type = %event.event_type(), event_id = %event.event_id())
    )]
    async fn publish(&self, event: &Event) -> DomainResult<DispatchReport> {
        self.event_store.append(event).await?;
        self.total_events.fetch_add(1, Ordering::Relaxed);

        let subscriptions = self.matching(event);
        let report = self
            .dispatcher
            .dispatch(event, &subscriptions, &self.config.dispatch_options())
            .await;

        if !report.failed.is_empty() {
            let failed = report.failed.len() as u64;
            let total = self.failed_deliveries.fetch_add(failed, Ordering::Relaxed) + failed;
            tracing::warn!(
                failed,
                failed_total = total,
                dead_lettered = report.dead_lettered,
                "event delivered with handler failures"
            );
        } else {
            tracing::debug!(handlers = report.handlers, "event delivered");
        }
        Ok(report)
    }

    fn subscribe(
        &self,
        pattern: &str,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> DomainResult<SubscriptionId> {
        let name = handler.handler_name().to_string();
        let id = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(Subscription::new(pattern, handler, options))?;
        tracing::debug!(%id, pattern, handler = %name, "subscribed");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        tracing::debug!(%id, removed, "unsubscribed");
        removed
    }

    fn subscription_count(&self) -> usize {
        self.registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;
    use crate::eventing::{InMemoryDeadLetterQueue, handler_fn};
    use crate::persist::{EventQuery, InMemoryEventStore};
    use std::sync::OnceLock;
    use std::sync::atomic::AtomicUsize;

    fn event(ty: &str) -> Event {
        Event::builder()
            .event_type(ty)
            .aggregate_id("t-1")
            .aggregate_type("task")
            .build()
            .unwrap()
    }

    fn counter(calls: &Arc<AtomicUsize>, fail: bool) -> Arc<dyn EventHandler> {
        let calls = calls.clone();
        handler_fn("counter", move |_event: Event| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                if fail {
                    Err(DomainError::transient("boom"))
                } else {
                    Ok(())
                }
            }
        })
    }

    #[tokio::test]
    async fn stores_before_dispatching() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = InMemoryEventBus::builder()
            .event_store(store.clone())
            .dead_letter_sink(Arc::new(InMemoryDeadLetterQueue::new()))
            .build();

        let seen_store = store.clone();
        let stored_first = Arc::new(AtomicUsize::new(0));
        let flag = stored_first.clone();
        let handler = handler_fn("checks-store", move |event: Event| {
            let store = seen_store.clone();
            let flag = flag.clone();
            async move {
                let stored = store
                    .get_events(&EventQuery::builder().event_type(event.event_type()).build())
                    .await?;
                if stored.iter().any(|e| e.event_id() == event.event_id()) {
                    flag.fetch_add(1, Ordering::SeqCst);
                }
                Ok::<_, DomainError>(())
            }
        });
        bus.subscribe("task.created", handler, SubscribeOptions::default())
            .unwrap();

        bus.publish(&event("task.created")).await.unwrap();
        assert_eq!(stored_first.load(Ordering::SeqCst), 1);
        assert_eq!(bus.total_events(), 1);
    }

    #[tokio::test]
    async fn store_failure_fails_publish_without_dispatch() {
        let store = Arc::new(InMemoryEventStore::new());
        let bus = InMemoryEventBus::builder()
            .event_store(store.clone())
            .dead_letter_sink(Arc::new(InMemoryDeadLetterQueue::new()))
            .build();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe("task.*", counter(&calls, false), SubscribeOptions::default())
            .unwrap();

        let e = event("task.created");
        bus.publish(&e).await.unwrap();
        let err = bus.publish(&e).await.unwrap_err();

        assert!(matches!(err, DomainError::Conflict { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.total_events(), 1);
    }

    #[tokio::test]
    async fn handler_failures_are_counted() {
        let dlq = Arc::new(InMemoryDeadLetterQueue::new());
        let bus = InMemoryEventBus::builder()
            .event_store(Arc::new(InMemoryEventStore::new()))
            .dead_letter_sink(dlq.clone())
            .build();
        let calls = Arc::new(AtomicUsize::new(0));
        bus.subscribe("task.*", counter(&calls, true), SubscribeOptions::default())
            .unwrap();
        bus.subscribe("**", counter(&calls, false), SubscribeOptions::default())
            .unwrap();

        let reports = bus
            .publish_batch(&[event("task.created"), event("task.updated")])
            .await
            .unwrap();

        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(|r| r.failed.len() == 1 && r.succeeded == 1));
        assert_eq!(bus.failed_deliveries(), 2);
        assert_eq!(dlq.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn filter_may_call_back_into_the_bus() {
        let slot: Arc<OnceLock<Arc<InMemoryEventBus>>> = Arc::new(OnceLock::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let bus_ref = slot.clone();
        let follow_up = calls.clone();
        let options = SubscribeOptions::default().with_filter(move |_event: &Event| {
            if let Some(bus) = bus_ref.get() {
                bus.subscribe(
                    "audit.recorded",
                    counter(&follow_up, false),
                    SubscribeOptions::default(),
                )
                .is_ok()
            } else {
                false
            }
        });

        let bus = Arc::new(
            InMemoryEventBus::builder()
                .event_store(Arc::new(InMemoryEventStore::new()))
                .dead_letter_sink(Arc::new(InMemoryDeadLetterQueue::new()))
                .build(),
        );
        assert!(slot.set(bus.clone()).is_ok());
        bus.subscribe("task.created", counter(&calls, false), options)
            .unwrap();

        let report = bus.publish(&event("task.created")).await.unwrap();

        assert_eq!(report.succeeded, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.subscription_count(), 2);
    }

    #[tokio::test]
    async fn subscribe_rejects_bad_pattern() {
        let bus = InMemoryEventBus::builder()
            .event_store(Arc::new(InMemoryEventStore::new()))
            .dead_letter_sink(Arc::new(InMemoryDeadLetterQueue::new()))
            .build();
        let calls = Arc::new(AtomicUsize::new(0));

        assert!(
            bus.subscribe("task..x", counter(&calls, false), SubscribeOptions::default())
                .is_err()
        );
        assert_eq!(bus.subscription_count(), 0);
        assert!(!bus.unsubscribe(SubscriptionId::new()));
    }
}
