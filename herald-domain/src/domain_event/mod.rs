//! 领域事件（Domain Event）与事件信封
//!
//! 定义不可变的 `Event`、其元数据 `EventMetadata`、具体载荷需要实现的
//! `DomainEvent`，以及记录投递状态的 `EventEnvelope`。

mod domain_event_trait;
mod event;
mod event_envelope;
mod event_type;
mod metadata;

pub use domain_event_trait::DomainEvent;
pub use event::Event;
pub use event_envelope::EventEnvelope;
pub use event_type::validate_event_type;
pub use metadata::{DEFAULT_EVENT_SOURCE, DEFAULT_EVENT_VERSION, EventMetadata};
