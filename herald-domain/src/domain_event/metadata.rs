use bon::Builder;
use serde::{Deserialize, Serialize};

/// 缺省的事件载荷版本
pub const DEFAULT_EVENT_VERSION: &str = "1.0";

/// 缺省的事件来源
pub const DEFAULT_EVENT_SOURCE: &str = "unknown";

fn default_version() -> String {
    DEFAULT_EVENT_VERSION.to_string()
}

fn default_source() -> String {
    DEFAULT_EVENT_SOURCE.to_string()
}

/// 事件元数据：载荷版本、来源与链路追踪 ID
#[derive(Builder, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// 载荷 schema 版本（如 `1.0`、`2.1`），用于上抬
    #[builder(into, default = default_version())]
    #[serde(default = "default_version")]
    version: String,
    /// 产生事件的模块/服务
    #[builder(into, default = default_source())]
    #[serde(default = "default_source")]
    source: String,
    /// 关联 ID
    #[builder(into)]
    correlation_id: Option<String>,
    /// 因果 ID
    #[builder(into)]
    causation_id: Option<String>,
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            version: default_version(),
            source: default_source(),
            correlation_id: None,
            causation_id: None,
        }
    }
}

impl EventMetadata {
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.causation_id.as_deref()
    }

    pub(crate) fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }
}
