//! 领域层统一错误定义
//!
//! 聚焦事件校验、处理器执行、重试、死信与版本上抬等最小必要集合，
//! 便于在各实现层统一转换为 `DomainError`。
//!
//! 错误按“是否可重试”分为两类，由 [`DomainError::is_retryable`] 给出判定，
//! `RetryPolicy` 的默认判定函数即基于此。
//!
use thiserror::Error;

/// 统一错误类型（基础库最小必要集）
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum DomainError {
    // --- 序列化/事件模型 ---
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("invalid event type: {event_type}, reason={reason}")]
    InvalidEventType { event_type: String, reason: String },

    // --- 不可重试的业务错误 ---
    #[error("validation error: {reason}")]
    Validation { reason: String },
    #[error("unauthorized: {reason}")]
    Unauthorized { reason: String },
    #[error("not found: {reason}")]
    NotFound { reason: String },
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    // --- 可重试的执行错误 ---
    #[error("transient error: {reason}")]
    Transient { reason: String },
    #[error("handler timed out: handler={handler}, timeout_ms={timeout_ms}")]
    Timeout { handler: String, timeout_ms: u64 },
    #[error("event handler error: handler={handler}, reason={reason}")]
    EventHandler { handler: String, reason: String },

    // --- 事件系统/外部协作者 ---
    #[error("event bus error: {reason}")]
    EventBus { reason: String },
    #[error("event store error: {reason}")]
    EventStore { reason: String },
    #[error("dead letter error: {reason}")]
    DeadLetter { reason: String },
    #[error("invalid retry policy: {reason}")]
    InvalidRetryPolicy { reason: String },

    // --- 版本上抬 ---
    #[error("no upcast path: type={event_type}, from={from_version}, to={to_version}")]
    UpcastPathNotFound {
        event_type: String,
        from_version: String,
        to_version: String,
    },
    #[error("version mismatch: type={event_type}, expected={expected}, found={found}")]
    VersionMismatch {
        event_type: String,
        expected: String,
        found: String,
    },
    #[error("type mismatch: expected={expected}, found={found}")]
    TypeMismatch { expected: String, found: String },
    #[error("upcast failed: type={event_type}, from={from_version}, to={to_version}, reason={reason}")]
    UpcastFailed {
        event_type: String,
        from_version: String,
        to_version: String,
        reason: String,
    },
}

impl DomainError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        Self::Transient {
            reason: reason.into(),
        }
    }

    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
        }
    }

    pub fn event_bus(reason: impl Into<String>) -> Self {
        Self::EventBus {
            reason: reason.into(),
        }
    }

    pub fn event_store(reason: impl Into<String>) -> Self {
        Self::EventStore {
            reason: reason.into(),
        }
    }

    pub fn event_handler(handler: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EventHandler {
            handler: handler.into(),
            reason: reason.into(),
        }
    }

    /// 是否属于可重试错误
    ///
    /// 校验、鉴权、资源不存在、冲突以及版本/类型不匹配等错误重试也不会成功，
    /// 其余（瞬时错误、超时、处理器/存储/总线错误）默认可重试。
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            DomainError::Serde { .. }
                | DomainError::InvalidEventType { .. }
                | DomainError::Validation { .. }
                | DomainError::Unauthorized { .. }
                | DomainError::NotFound { .. }
                | DomainError::Conflict { .. }
                | DomainError::InvalidRetryPolicy { .. }
                | DomainError::UpcastPathNotFound { .. }
                | DomainError::VersionMismatch { .. }
                | DomainError::TypeMismatch { .. }
        )
    }
}

/// 统一 Result 类型别名
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_taxonomy() {
        assert!(DomainError::transient("db down").is_retryable());
        assert!(
            DomainError::Timeout {
                handler: "h".into(),
                timeout_ms: 10
            }
            .is_retryable()
        );
        assert!(DomainError::event_handler("h", "boom").is_retryable());

        assert!(!DomainError::validation("bad").is_retryable());
        assert!(!DomainError::not_found("x").is_retryable());
        assert!(
            !DomainError::Conflict {
                reason: "dup".into()
            }
            .is_retryable()
        );
        assert!(
            !DomainError::Unauthorized {
                reason: "nope".into()
            }
            .is_retryable()
        );
        assert!(
            !DomainError::VersionMismatch {
                event_type: "a.b".into(),
                expected: "1.0".into(),
                found: "2.0".into(),
            }
            .is_retryable()
        );
    }
}
