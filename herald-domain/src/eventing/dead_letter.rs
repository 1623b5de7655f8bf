//! 死信（Dead Letter）
//!
//! 分发器只依赖 `DeadLetterSink::send` 这一项能力；死信的存储、重放与重新入队
//! 由具体实现负责。交给 sink 的信封保证 `is_dead_letter = true` 且携带错误。
//!
use crate::domain_event::EventEnvelope;
use crate::error::{DomainError, DomainResult};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// 死信接收端
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn send(&self, envelope: EventEnvelope) -> DomainResult<()>;
}

/// 校验信封处于死信终态
pub fn ensure_dead_letter(envelope: &EventEnvelope) -> DomainResult<()> {
    if !envelope.is_dead_letter() {
        return Err(DomainError::DeadLetter {
            reason: format!("envelope for {} is not dead-lettered", envelope.event().event_id()),
        });
    }
    if envelope.error().is_none() {
        return Err(DomainError::DeadLetter {
            reason: format!("envelope for {} carries no error", envelope.event().event_id()),
        });
    }
    Ok(())
}

/// 内存死信队列，便于测试与本地排查
#[derive(Debug, Default)]
pub struct InMemoryDeadLetterQueue {
    entries: Mutex<Vec<EventEnvelope>>,
}

impl InMemoryDeadLetterQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn envelopes(&self) -> Vec<EventEnvelope> {
        self.lock().clone()
    }

    /// 取出并清空全部死信
    pub fn drain(&self) -> Vec<EventEnvelope> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<EventEnvelope>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterQueue {
    async fn send(&self, envelope: EventEnvelope) -> DomainResult<()> {
        ensure_dead_letter(&envelope)?;
        self.lock().push(envelope);
        Ok(())
    }
}
