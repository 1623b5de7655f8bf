//! 订阅模式匹配（Pattern Matcher）
//!
//! 支持三类订阅模式：
//! - 精确匹配：`task.created`；
//! - 单段通配：`task.*` 中的 `*` 仅匹配一个不含 `.` 的段；
//! - 全匹配：`**`，或整个模式仅为 `*`。
//!
//! 含 `*` 的其余模式会被编译为锚定的正则并按原始模式字符串缓存，
//! 分发热路径上不再重复编译。缓存可被并发读写。
//!
use dashmap::DashMap;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// 全匹配模式
pub const MATCH_ALL: &str = "**";

static DEFAULT_MATCHER: LazyLock<PatternMatcher> = LazyLock::new(PatternMatcher::new);

/// 带编译缓存的模式匹配器
#[derive(Debug, Default)]
pub struct PatternMatcher {
    cache: DashMap<String, Arc<Regex>>,
}

impl PatternMatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matches(&self, event_type: &str, pattern: &str) -> bool {
        if event_type == pattern || is_match_all(pattern) {
            return true;
        }
        if !pattern.contains('*') {
            return false;
        }

        self.compiled(pattern)
            .is_some_and(|regex| regex.is_match(event_type))
    }

    pub fn matches_any<I, S>(&self, event_type: &str, patterns: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .any(|p| self.matches(event_type, p.as_ref()))
    }

    pub fn matches_all<I, S>(&self, event_type: &str, patterns: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        patterns
            .into_iter()
            .all(|p| self.matches(event_type, p.as_ref()))
    }

    /// 已缓存的编译模式数量
    pub fn cached_patterns(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    fn compiled(&self, pattern: &str) -> Option<Arc<Regex>> {
        if let Some(regex) = self.cache.get(pattern) {
            return Some(regex.value().clone());
        }

        match Regex::new(&wildcard_to_regex(pattern)) {
            Ok(regex) => {
                let entry = self
                    .cache
                    .entry(pattern.to_string())
                    .or_insert_with(|| Arc::new(regex));
                Some(entry.value().clone())
            }
            Err(err) => {
                tracing::warn!(pattern, error = %err, "failed to compile subscription pattern");
                None
            }
        }
    }
}

/// 是否为全匹配模式
pub fn is_match_all(pattern: &str) -> bool {
    pattern == MATCH_ALL || pattern == "*"
}

fn wildcard_to_regex(pattern: &str) -> String {
    let body = pattern
        .split('*')
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("[^.]+");
    format!("^{body}$")
}

/// 使用进程级共享匹配器判断事件类型是否匹配模式
pub fn matches(event_type: &str, pattern: &str) -> bool {
    DEFAULT_MATCHER.matches(event_type, pattern)
}

pub fn matches_any<I, S>(event_type: &str, patterns: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DEFAULT_MATCHER.matches_any(event_type, patterns)
}

pub fn matches_all<I, S>(event_type: &str, patterns: I) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    DEFAULT_MATCHER.matches_all(event_type, patterns)
}
