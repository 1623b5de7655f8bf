//! 持久化（persist）
//!
//! 定义总线依赖的事件存储协议 `EventStore` 与查询条件 `EventQuery`，
//! 并提供带容量上限的内存实现 `InMemoryEventStore`。
//!
//! 该模块聚焦协议，持久化后端（数据库、分层冷热存储等）由上层实现并注入。
//!
mod event_store;
mod event_store_inmemory;

pub use event_store::{EventQuery, EventStore, SortOrder};
pub use event_store_inmemory::InMemoryEventStore;
