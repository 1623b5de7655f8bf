//! 订阅（Subscription）与订阅注册表
//!
//! 注册表对精确事件类型建立哈希索引，通配模式单独存放并逐一匹配；
//! 匹配结果按订阅注册顺序返回。
//!
use super::handler::EventHandler;
use crate::domain_event::Event;
use crate::error::{DomainError, DomainResult};
use crate::pattern::PatternMatcher;
use crate::retry::RetryPolicy;
use bon::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// 订阅 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// 事件过滤谓词
pub type EventFilter = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

/// 订阅选项
#[derive(Clone, Default, Builder)]
pub struct SubscribeOptions {
    /// 该处理器专属的重试策略
    retry_policy: Option<RetryPolicy>,
    /// 仅投递满足谓词的事件
    filter: Option<EventFilter>,
    /// 单次调用超时，覆盖总线配置
    timeout: Option<Duration>,
}

impl SubscribeOptions {
    pub fn with_filter<F>(self, f: F) -> Self
    where
        F: Fn(&Event) -> bool + Send + Sync + 'static,
    {
        Self {
            filter: Some(Arc::new(f)),
            ..self
        }
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry_policy.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn accepts(&self, event: &Event) -> bool {
        self.filter.as_ref().is_none_or(|f| f(event))
    }
}

impl fmt::Debug for SubscribeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscribeOptions")
            .field("retry_policy", &self.retry_policy)
            .field("filter", &self.filter.as_ref().map(|_| "custom"))
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// 一条订阅
#[derive(Clone)]
pub struct Subscription {
    id: SubscriptionId,
    pattern: String,
    handler: Arc<dyn EventHandler>,
    options: SubscribeOptions,
    /// 注册序号，决定同一事件上的准入顺序
    seq: u64,
}

impl Subscription {
    pub fn new(
        pattern: impl Into<String>,
        handler: Arc<dyn EventHandler>,
        options: SubscribeOptions,
    ) -> Self {
        Self {
            id: SubscriptionId::new(),
            pattern: pattern.into(),
            handler,
            options,
            seq: 0,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }

    pub fn handler_name(&self) -> &str {
        self.handler.handler_name()
    }

    pub fn options(&self) -> &SubscribeOptions {
        &self.options
    }

    pub fn accepts(&self, event: &Event) -> bool {
        self.options.accepts(event)
    }

    fn is_wildcard(&self) -> bool {
        self.pattern.contains('*')
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pattern", &self.pattern)
            .field("handler", &self.handler.handler_name())
            .field("options", &self.options)
            .finish()
    }
}

/// 校验订阅模式：非空且各段非空
pub fn validate_pattern(pattern: &str) -> DomainResult<()> {
    if pattern.is_empty() || pattern.split('.').any(str::is_empty) {
        return Err(DomainError::validation(format!(
            "invalid subscription pattern: {pattern:?}"
        )));
    }
    Ok(())
}

/// 订阅注册表
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    exact: HashMap<String, Vec<Subscription>>,
    wildcard: Vec<Subscription>,
    next_seq: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mut subscription: Subscription) -> DomainResult<SubscriptionId> {
        validate_pattern(subscription.pattern())?;

        subscription.seq = self.next_seq;
        self.next_seq += 1;
        let id = subscription.id;

        if subscription.is_wildcard() {
            self.wildcard.push(subscription);
        } else {
            self.exact
                .entry(subscription.pattern.clone())
                .or_default()
                .push(subscription);
        }
        Ok(id)
    }

    /// 移除订阅，返回是否存在
    pub fn remove(&mut self, id: SubscriptionId) -> bool {
        if let Some(pos) = self.wildcard.iter().position(|s| s.id == id) {
            self.wildcard.remove(pos);
            return true;
        }

        let mut emptied = None;
        let mut found = false;
        for (pattern, list) in self.exact.iter_mut() {
            if let Some(pos) = list.iter().position(|s| s.id == id) {
                list.remove(pos);
                found = true;
                if list.is_empty() {
                    emptied = Some(pattern.clone());
                }
                break;
            }
        }
        if let Some(pattern) = emptied {
            self.exact.remove(&pattern);
        }
        found
    }

    /// 模式匹配事件的订阅，按注册顺序；不执行过滤谓词
    ///
    /// 过滤谓词是调用方代码，持锁的调用者应在释放锁之后再执行
    /// [`Subscription::accepts`]。
    pub fn matching_patterns(&self, matcher: &PatternMatcher, event: &Event) -> Vec<Subscription> {
        let mut matched: Vec<Subscription> = self
            .exact
            .get(event.event_type())
            .into_iter()
            .flatten()
            .chain(
                self.wildcard
                    .iter()
                    .filter(|s| matcher.matches(event.event_type(), &s.pattern)),
            )
            .cloned()
            .collect();
        matched.sort_by_key(|s| s.seq);
        matched
    }

    /// 匹配事件的订阅（已应用过滤谓词），按注册顺序
    pub fn matching(&self, matcher: &PatternMatcher, event: &Event) -> Vec<Subscription> {
        let mut matched = self.matching_patterns(matcher, event);
        matched.retain(|s| s.accepts(event));
        matched
    }

    pub fn len(&self) -> usize {
        self.exact.values().map(Vec::len).sum::<usize>() + self.wildcard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
