use crate::domain_event::Event;
use crate::error::DomainResult;
use async_trait::async_trait;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 按时间戳排序的方向
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// 事件查询条件；`since`/`until` 均为闭区间
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
pub struct EventQuery {
    #[builder(into)]
    pub event_type: Option<String>,
    #[builder(into)]
    pub aggregate_id: Option<String>,
    #[builder(into)]
    pub aggregate_type: Option<String>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    #[builder(default)]
    #[serde(default)]
    pub order: SortOrder,
}

impl EventQuery {
    /// 是否满足除分页与排序以外的全部条件
    pub fn matches(&self, event: &Event) -> bool {
        self.event_type
            .as_deref()
            .is_none_or(|t| t == event.event_type())
            && self
                .aggregate_id
                .as_deref()
                .is_none_or(|id| id == event.aggregate_id())
            && self
                .aggregate_type
                .as_deref()
                .is_none_or(|t| t == event.aggregate_type())
            && self.since.is_none_or(|since| event.timestamp() >= since)
            && self.until.is_none_or(|until| event.timestamp() <= until)
    }
}

/// 事件存储：总线在分发前调用 `append`，先持久化后投递
#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append(&self, event: &Event) -> DomainResult<()>;

    async fn append_batch(&self, events: &[Event]) -> DomainResult<()> {
        for event in events {
            self.append(event).await?;
        }
        Ok(())
    }

    async fn get_events(&self, query: &EventQuery) -> DomainResult<Vec<Event>>;

    async fn count(&self) -> DomainResult<usize>;
}

#[async_trait]
impl<T> EventStore for Arc<T>
where
    T: EventStore + ?Sized,
{
    async fn append(&self, event: &Event) -> DomainResult<()> {
        (**self).append(event).await
    }

    async fn append_batch(&self, events: &[Event]) -> DomainResult<()> {
        (**self).append_batch(events).await
    }

    async fn get_events(&self, query: &EventQuery) -> DomainResult<Vec<Event>> {
        (**self).get_events(query).await
    }

    async fn count(&self) -> DomainResult<usize> {
        (**self).count().await
    }
}
