use crate::domain_event::Event;
use crate::error::{DomainError, DomainResult};
use serde_json::Value;
use std::sync::Arc;

/// 事件版本升级器（Upcaster）：某一事件类型上 `from_version -> to_version` 的一条边
pub trait EventUpcaster: Send + Sync {
    fn event_type(&self) -> &str;

    fn from_version(&self) -> &str;

    fn to_version(&self) -> &str;

    /// 可选守卫：返回 `false` 时拒绝转换该事件
    fn can_upcast(&self, _event: &Event) -> bool {
        true
    }

    /// 纯函数式的事件转换，无需自行修改版本号
    fn transform(&self, event: Event) -> DomainResult<Event>;

    /// 校验输入事件的类型与版本后执行转换，并将结果标记为 `to_version`
    fn upcast(&self, event: Event) -> DomainResult<Event> {
        if event.event_type() != self.event_type() {
            return Err(DomainError::TypeMismatch {
                expected: self.event_type().to_string(),
                found: event.event_type().to_string(),
            });
        }
        if event.version() != self.from_version() {
            return Err(DomainError::VersionMismatch {
                event_type: self.event_type().to_string(),
                expected: self.from_version().to_string(),
                found: event.version().to_string(),
            });
        }
        if !self.can_upcast(&event) {
            return Err(DomainError::UpcastFailed {
                event_type: self.event_type().to_string(),
                from_version: self.from_version().to_string(),
                to_version: self.to_version().to_string(),
                reason: "rejected by can_upcast guard".into(),
            });
        }

        Ok(self.transform(event)?.with_version(self.to_version()))
    }
}

impl<T> EventUpcaster for Arc<T>
where
    T: EventUpcaster + ?Sized,
{
    fn event_type(&self) -> &str {
        (**self).event_type()
    }

    fn from_version(&self) -> &str {
        (**self).from_version()
    }

    fn to_version(&self) -> &str {
        (**self).to_version()
    }

    fn can_upcast(&self, event: &Event) -> bool {
        (**self).can_upcast(event)
    }

    fn transform(&self, event: Event) -> DomainResult<Event> {
        (**self).transform(event)
    }
}

/// 以载荷转换闭包实现的升级器
pub struct FnUpcaster<F> {
    event_type: String,
    from_version: String,
    to_version: String,
    transform: F,
}

impl<F> FnUpcaster<F>
where
    F: Fn(Value) -> DomainResult<Value> + Send + Sync,
{
    pub fn new(
        event_type: impl Into<String>,
        from_version: impl Into<String>,
        to_version: impl Into<String>,
        transform: F,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            from_version: from_version.into(),
            to_version: to_version.into(),
            transform,
        }
    }
}

impl<F> EventUpcaster for FnUpcaster<F>
where
    F: Fn(Value) -> DomainResult<Value> + Send + Sync,
{
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn from_version(&self) -> &str {
        &self.from_version
    }

    fn to_version(&self) -> &str {
        &self.to_version
    }

    fn transform(&self, event: Event) -> DomainResult<Event> {
        let payload = (self.transform)(event.payload().clone())?;
        Ok(event.with_payload(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain_event::EventMetadata;
    use serde_json::json;

    fn event(ty: &str, version: &str) -> Event {
        Event::builder()
            .event_type(ty)
            .aggregate_id("t-1")
            .aggregate_type("task")
            .payload(json!({"name": "a"}))
            .metadata(EventMetadata::builder().version(version).build())
            .build()
            .unwrap()
    }

    fn rename_name_to_title() -> FnUpcaster<impl Fn(Value) -> DomainResult<Value> + Send + Sync> {
        FnUpcaster::new("task.created", "1.0", "1.1", |mut payload: Value| {
            if let Some(obj) = payload.as_object_mut()
                && let Some(name) = obj.remove("name")
            {
                obj.insert("title".into(), name);
            }
            Ok(payload)
        })
    }

    #[test]
    fn upcast_transforms_and_stamps_version() {
        let next = rename_name_to_title()
            .upcast(event("task.created", "1.0"))
            .unwrap();
        assert_eq!(next.version(), "1.1");
        assert_eq!(next.payload(), &json!({"title": "a"}));
    }

    #[test]
    fn wrong_version_is_rejected() {
        let err = rename_name_to_title()
            .upcast(event("task.created", "2.0"))
            .unwrap_err();
        match err {
            DomainError::VersionMismatch {
                expected, found, ..
            } => {
                assert_eq!(expected, "1.0");
                assert_eq!(found, "2.0");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn wrong_type_is_rejected() {
        let err = rename_name_to_title()
            .upcast(event("user.created", "1.0"))
            .unwrap_err();
        assert!(matches!(err, DomainError::TypeMismatch { .. }));
    }

    struct Guarded;
    impl EventUpcaster for Guarded {
        fn event_type(&self) -> &str {
            "task.created"
        }
        fn from_version(&self) -> &str {
            "1.0"
        }
        fn to_version(&self) -> &str {
            "2.0"
        }
        fn can_upcast(&self, event: &Event) -> bool {
            event.payload().get("name").is_some()
        }
        fn transform(&self, event: Event) -> DomainResult<Event> {
            Ok(event)
        }
    }

    #[test]
    fn guard_rejection_is_reported() {
        let ev = event("task.created", "1.0").with_payload(json!({}));
        let err = Arc::new(Guarded).upcast(ev).unwrap_err();
        assert!(matches!(err, DomainError::UpcastFailed { .. }));
    }
}
