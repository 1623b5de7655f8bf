//! 事件处理器（EventHandler）
//!
//! 定义消费事件的处理逻辑与元信息（名称）。处理器可能在重试时被多次调用，
//! 实现需保证可安全重入。
//!
use crate::domain_event::Event;
use crate::error::{DomainError, DomainResult};
use crate::event_upcaster::EventUpcasterChain;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// 事件处理器
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于失败标记、死信与日志）
    fn handler_name(&self) -> &str;

    /// 处理事件
    async fn handle(&self, event: &Event) -> DomainResult<()>;
}

/// 以异步闭包实现的处理器
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// 由闭包构建处理器，闭包接收事件的拷贝
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DomainResult<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DomainResult<()>> + Send + 'static,
{
    fn handler_name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> DomainResult<()> {
        (self.f)(event.clone()).await
    }
}

/// 在调用内部处理器前将事件上抬到期望版本
///
/// 无上抬路径时跳过该事件（记录日志后视为成功）；版本/类型不匹配等错误
/// 原样返回。
pub struct UpcastingHandler {
    inner: Arc<dyn EventHandler>,
    chain: Arc<EventUpcasterChain>,
    expected_version: String,
}

impl UpcastingHandler {
    pub fn new(
        inner: Arc<dyn EventHandler>,
        chain: Arc<EventUpcasterChain>,
        expected_version: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            chain,
            expected_version: expected_version.into(),
        }
    }
}

#[async_trait]
impl EventHandler for UpcastingHandler {
    fn handler_name(&self) -> &str {
        self.inner.handler_name()
    }

    async fn handle(&self, event: &Event) -> DomainResult<()> {
        match self.chain.upcast(event.clone(), &self.expected_version) {
            Ok(result) => self.inner.handle(&result.event).await,
            Err(DomainError::UpcastPathNotFound {
                event_type,
                from_version,
                to_version,
            }) => {
                tracing::warn!(
                    handler = self.inner.handler_name(),
                    %event_type,
                    %from_version,
                    %to_version,
                    "no upcast path, skipping event"
                );
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::EventMetadata;
    use crate::event_upcaster::{EventUpcaster, FnUpcaster};
    use serde_json::{Value, json};
    use std::sync::Mutex;

    fn event(version: &str) -> Event {
        Event::builder()
            .event_type("task.created")
            .aggregate_id("t-1")
            .aggregate_type("task")
            .payload(json!({"name": "a"}))
            .metadata(EventMetadata::builder().version(version).build())
            .build()
            .unwrap()
    }

    fn recording() -> (Arc<dyn EventHandler>, Arc<Mutex<Vec<Event>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let handler = handler_fn("recorder", move |event: Event| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(event);
                Ok(())
            }
        });
        (handler, seen)
    }

    #[tokio::test]
    async fn fn_handler_receives_event() {
        let (handler, seen) = recording();
        assert_eq!(handler.handler_name(), "recorder");
        handler.handle(&event("1.0")).await.unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upcasting_handler_delivers_expected_version() {
        let chain = Arc::new(EventUpcasterChain::new());
        chain.register(Arc::new(FnUpcaster::new(
            "task.created",
            "1.0",
            "2.0",
            |mut payload: Value| {
                if let Some(obj) = payload.as_object_mut()
                    && let Some(name) = obj.remove("name")
                {
                    obj.insert("title".into(), name);
                }
                Ok(payload)
            },
        )) as Arc<dyn EventUpcaster>);

        let (inner, seen) = recording();
        let handler = UpcastingHandler::new(inner, chain, "2.0");
        handler.handle(&event("1.0")).await.unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].version(), "2.0");
        assert_eq!(seen[0].payload(), &json!({"title": "a"}));
    }

    #[tokio::test]
    async fn missing_path_skips_without_invoking() {
        let (inner, seen) = recording();
        let handler = UpcastingHandler::new(inner, Arc::new(EventUpcasterChain::new()), "9.0");

        handler.handle(&event("1.0")).await.unwrap();
        assert!(seen.lock().unwrap().is_empty());
    }
}
