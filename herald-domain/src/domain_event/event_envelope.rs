use super::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 事件信封：在不改变事件本身的前提下记录投递状态
///
/// 状态迁移总是消费旧信封并返回新信封；`is_dead_letter = true` 为终态。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    event: Event,
    /// 已进行的投递尝试次数
    retry_count: u32,
    last_attempt: Option<DateTime<Utc>>,
    /// 最近一次失败原因
    error: Option<String>,
    created_at: DateTime<Utc>,
    is_dead_letter: bool,
    /// 构造时的事件类型，事件被转换后保持不变
    original_event_type: String,
    /// 耗尽重试的处理器名称
    failed_handler: Option<String>,
}

impl EventEnvelope {
    pub fn new(event: Event) -> Self {
        let original_event_type = event.event_type().to_string();
        Self {
            event,
            retry_count: 0,
            last_attempt: None,
            error: None,
            created_at: Utc::now(),
            is_dead_letter: false,
            original_event_type,
            failed_handler: None,
        }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn last_attempt(&self) -> Option<DateTime<Utc>> {
        self.last_attempt
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_dead_letter(&self) -> bool {
        self.is_dead_letter
    }

    pub fn original_event_type(&self) -> &str {
        &self.original_event_type
    }

    pub fn failed_handler(&self) -> Option<&str> {
        self.failed_handler.as_deref()
    }

    /// 记录一次失败的投递尝试
    pub fn record_attempt(self, at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            retry_count: self.retry_count + 1,
            last_attempt: Some(at),
            error: Some(error.into()),
            ..self
        }
    }

    /// 标记为死信（终态）
    pub fn into_dead_letter(self, handler: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            is_dead_letter: true,
            failed_handler: Some(handler.into()),
            ..self
        }
    }

    /// 替换被包裹的事件，`original_event_type` 保持构造时的值
    pub fn with_event(self, event: Event) -> Self {
        Self { event, ..self }
    }
}
