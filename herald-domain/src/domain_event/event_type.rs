use crate::error::{DomainError, DomainResult};

/// 校验事件类型语法：`segment(.segment)+`
///
/// 每个段非空，仅允许 ASCII 字母、数字、`_` 与 `-`。
pub fn validate_event_type(event_type: &str) -> DomainResult<()> {
    let invalid = |reason: &str| DomainError::InvalidEventType {
        event_type: event_type.to_string(),
        reason: reason.to_string(),
    };

    let segments: Vec<&str> = event_type.split('.').collect();
    if segments.len() < 2 {
        return Err(invalid("expected at least two dot-separated segments"));
    }

    for segment in segments {
        if segment.is_empty() {
            return Err(invalid("empty segment"));
        }
        if !segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(invalid("segment contains illegal characters"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_namespaced_types() {
        for ty in ["task.created", "user.profile.updated", "blue_print.v2-draft.saved"] {
            assert!(validate_event_type(ty).is_ok(), "{ty}");
        }
    }

    #[test]
    fn rejects_malformed_types() {
        for ty in ["", "task", "task.", ".created", "task..created", "task.*", "task created.x"] {
            let err = validate_event_type(ty).unwrap_err();
            assert!(matches!(err, DomainError::InvalidEventType { .. }), "{ty}");
        }
    }
}
