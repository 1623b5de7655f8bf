use serde::Serialize;
use serde::de::DeserializeOwned;

/// 具体事件载荷需要满足的通用能力边界
///
/// 每个载荷类型静态声明自身的事件类型、所属聚合类型与 schema 版本，
/// 通过 [`Event::from_domain`](super::Event::from_domain) 构建事件。
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync {
    /// 事件类型（形如 `task.created`）
    const EVENT_TYPE: &'static str;

    /// 聚合类型（形如 `task`）
    const AGGREGATE_TYPE: &'static str;

    /// 载荷 schema 版本
    const VERSION: &'static str = super::metadata::DEFAULT_EVENT_VERSION;
}
