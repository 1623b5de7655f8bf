//! 事件子系统（eventing）
//!
//! 提供进程内事件发布/订阅与可靠处理：
//! - `EventBus`：统一发布/订阅接口，`InMemoryEventBus` 为内存实现；
//! - `EventHandler`：消费事件的处理器，`UpcastingHandler` 在调用前完成版本上抬；
//! - `EventSubscriber`：以静态绑定列表显式声明订阅；
//! - `Dispatcher`：有界并发、超时、按处理器重试与失败隔离；
//! - `DeadLetterSink`：接收耗尽重试的事件信封。
//!
mod bus;
mod bus_inmemory;
mod dead_letter;
mod dispatcher;
mod handler;
mod subscriber;
mod subscription;

pub use bus::{EventBus, EventBusConfig};
pub use bus_inmemory::InMemoryEventBus;
pub use dead_letter::{DeadLetterSink, InMemoryDeadLetterQueue, ensure_dead_letter};
pub use dispatcher::{DispatchOptions, DispatchReport, Dispatcher, HandlerFailure};
pub use handler::{EventHandler, FnHandler, UpcastingHandler, handler_fn};
pub use subscriber::{
    EventSubscriber, HandlerFuture, MethodHandler, SubscriberBinding, SubscriberMethod,
};
pub use subscription::{
    EventFilter, SubscribeOptions, Subscription, SubscriptionId, SubscriptionRegistry,
    validate_pattern,
};
