//! 进程内事件总线（herald-domain）
//!
//! 将领域事件的生产方与众多相互独立的消费方解耦，并提供：
//! - 事件与信封模型（`domain_event`）
//! - 事件类型的通配模式匹配（`pattern`）
//! - 可配置退避与抖动的重试（`retry`）
//! - 有界并发、失败隔离与死信路由的事件分发（`eventing`）
//! - 按最短路径迁移事件版本的上抬链（`event_upcaster`）
//! - 分发前持久化所依赖的事件存储协议（`persist`）
//!
//! 典型用法：
//! 1. 定义实现 `DomainEvent` 的事件载荷，用 `Event::from_domain` 构建事件；
//! 2. 选择 `persist` 中的事件存储与 `eventing` 中的死信接收端并注入总线；
//! 3. 以模式订阅处理器（或通过 `EventSubscriber` 批量注册），按需配置重试与超时；
//! 4. 载荷结构演进时注册 `EventUpcaster`，用 `UpcastingHandler` 保证处理器拿到期望版本。
//!
pub mod domain_event;
pub mod error;
pub mod event_upcaster;
#[cfg(feature = "eventing")]
pub mod eventing;
pub mod pattern;
pub mod persist;
pub mod retry;
