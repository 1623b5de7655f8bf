//! 内存版事件存储（InMemoryEventStore）
//!
//! 作为热层存储使用：可选容量上限，超出后按插入顺序淘汰最早的事件。
//! 典型用途：测试环境、示例与本地开发。
//!
use super::event_store::{EventQuery, EventStore, SortOrder};
use crate::domain_event::Event;
use crate::error::{DomainError, DomainResult};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    events: VecDeque<Event>,
    ids: HashSet<Uuid>,
}

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    inner: Mutex<Inner>,
    capacity: Option<usize>,
}

impl InMemoryEventStore {
    /// 不限容量
    pub fn new() -> Self {
        Self::default()
    }

    /// 最多保留 `capacity` 个事件（至少 1 个）
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::default(),
            capacity: Some(capacity.max(1)),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn append(&self, event: &Event) -> DomainResult<()> {
        let mut inner = self.lock();
        if !inner.ids.insert(event.event_id()) {
            return Err(DomainError::Conflict {
                reason: format!("event {} already stored", event.event_id()),
            });
        }
        inner.events.push_back(event.clone());

        if let Some(capacity) = self.capacity {
            while inner.events.len() > capacity {
                if let Some(evicted) = inner.events.pop_front() {
                    inner.ids.remove(&evicted.event_id());
                    tracing::debug!(event_id = %evicted.event_id(), capacity, "evicted oldest event");
                }
            }
        }
        Ok(())
    }

    async fn get_events(&self, query: &EventQuery) -> DomainResult<Vec<Event>> {
        let mut events: Vec<Event> = self
            .lock()
            .events
            .iter()
            .filter(|e| query.matches(e))
            .cloned()
            .collect();

        events.sort_by_key(Event::timestamp);
        if query.order == SortOrder::Desc {
            events.reverse();
        }

        Ok(events
            .into_iter()
            .skip(query.offset.unwrap_or(0))
            .take(query.limit.unwrap_or(usize::MAX))
            .collect())
    }

    async fn count(&self) -> DomainResult<usize> {
        Ok(self.lock().events.len())
    }
}
