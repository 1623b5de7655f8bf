use super::domain_event_trait::DomainEvent;
use super::event_type::validate_event_type;
use super::metadata::EventMetadata;
use crate::error::{DomainError, DomainResult};
use bon::bon;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// 不可变事件
///
/// 构造时生成唯一 `event_id` 与时间戳，并校验事件类型语法；构造后不提供任何
/// 原地修改入口，转换（如上抬）总是产生新的值。反序列化同样校验事件类型语法。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent")]
pub struct Event {
    /// 事件唯一标识（UUID v7，进程内单调）
    event_id: Uuid,
    /// 事件发生时间
    timestamp: DateTime<Utc>,
    /// 事件所属主体
    aggregate_id: String,
    aggregate_type: String,
    /// 点分命名空间的事件类型，如 `task.created`
    event_type: String,
    /// 事件载荷
    payload: Value,
    metadata: EventMetadata,
}

/// 反序列化的中间形态，经 `TryFrom` 校验后转为 `Event`
#[derive(Deserialize)]
struct RawEvent {
    event_id: Uuid,
    timestamp: DateTime<Utc>,
    aggregate_id: String,
    aggregate_type: String,
    event_type: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    metadata: EventMetadata,
}

impl TryFrom<RawEvent> for Event {
    type Error = DomainError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        validate_event_type(&raw.event_type)?;
        Ok(Self {
            event_id: raw.event_id,
            timestamp: raw.timestamp,
            aggregate_id: raw.aggregate_id,
            aggregate_type: raw.aggregate_type,
            event_type: raw.event_type,
            payload: raw.payload,
            metadata: raw.metadata,
        })
    }
}

#[bon]
impl Event {
    #[builder]
    pub fn new(
        #[builder(into)] event_type: String,
        #[builder(into)] aggregate_id: String,
        #[builder(into)] aggregate_type: String,
        #[builder(default)] payload: Value,
        #[builder(default)] metadata: EventMetadata,
    ) -> DomainResult<Self> {
        validate_event_type(&event_type)?;

        Ok(Self {
            event_id: Uuid::now_v7(),
            timestamp: Utc::now(),
            aggregate_id,
            aggregate_type,
            event_type,
            payload,
            metadata,
        })
    }
}

impl Event {
    /// 由具体载荷类型构建事件，版本取自 `E::VERSION`
    pub fn from_domain<E: DomainEvent>(
        payload: &E,
        aggregate_id: impl Into<String>,
        metadata: EventMetadata,
    ) -> DomainResult<Self> {
        Event::builder()
            .event_type(E::EVENT_TYPE)
            .aggregate_id(aggregate_id)
            .aggregate_type(E::AGGREGATE_TYPE)
            .payload(serde_json::to_value(payload)?)
            .metadata(metadata.with_version(E::VERSION))
            .build()
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    /// 载荷 schema 版本
    pub fn version(&self) -> &str {
        self.metadata.version()
    }

    /// 将载荷解码为具体类型
    pub fn payload_as<E: DomainEvent>(&self) -> DomainResult<E> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// 生成替换了载荷的新事件（id、时间与主体保持不变）
    pub fn with_payload(self, payload: Value) -> Self {
        Self { payload, ..self }
    }

    /// 生成声明了新版本的事件
    pub fn with_version(self, version: impl Into<String>) -> Self {
        Self {
            metadata: self.metadata.with_version(version),
            ..self
        }
    }
}
