use crate::error::{DomainError, DomainResult};
use bon::bon;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// 缺省抖动比例（±10%）
pub const DEFAULT_JITTER: f64 = 0.1;

/// 自定义重试判定：`(错误, 第几次尝试) -> 是否继续重试`
pub type ShouldRetry = Arc<dyn Fn(&DomainError, u32) -> bool + Send + Sync>;

/// 退避策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `d * 2^(n-1)`
    #[default]
    Exponential,
    /// `d * n`
    Linear,
    /// `d`
    Fixed,
}

/// 重试策略（不可变值对象）
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: BackoffKind,
    initial_delay: Duration,
    max_delay: Option<Duration>,
    jitter: f64,
    should_retry: Option<ShouldRetry>,
}

#[bon]
impl RetryPolicy {
    #[builder]
    pub fn new(
        #[builder(default = 3)] max_attempts: u32,
        #[builder(default)] backoff: BackoffKind,
        #[builder(default = Duration::from_millis(100))] initial_delay: Duration,
        max_delay: Option<Duration>,
        #[builder(default = DEFAULT_JITTER)] jitter: f64,
    ) -> DomainResult<Self> {
        if initial_delay.is_zero() {
            return Err(DomainError::InvalidRetryPolicy {
                reason: "initial_delay must be greater than zero".into(),
            });
        }
        if max_delay.is_some_and(|d| d.is_zero()) {
            return Err(DomainError::InvalidRetryPolicy {
                reason: "max_delay must be greater than zero".into(),
            });
        }
        if !(0.0..=1.0).contains(&jitter) {
            return Err(DomainError::InvalidRetryPolicy {
                reason: format!("jitter must be within [0, 1], got {jitter}"),
            });
        }

        Ok(Self {
            max_attempts,
            backoff,
            initial_delay,
            max_delay,
            jitter,
            should_retry: None,
        })
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            initial_delay: Duration::from_millis(100),
            max_delay: Some(Duration::from_secs(10)),
            jitter: DEFAULT_JITTER,
            should_retry: None,
        }
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter)
            .field("should_retry", &self.should_retry.as_ref().map(|_| "custom"))
            .finish()
    }
}

impl RetryPolicy {
    /// 仅执行一次，不重试
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// 替换重试判定函数
    pub fn with_should_retry<F>(self, f: F) -> Self
    where
        F: Fn(&DomainError, u32) -> bool + Send + Sync + 'static,
    {
        Self {
            should_retry: Some(Arc::new(f)),
            ..self
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 实际允许的尝试次数；`max_attempts = 0` 表示关闭重试，仍执行一次
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn backoff(&self) -> BackoffKind {
        self.backoff
    }

    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    pub fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// 第 `attempt` 次失败后是否应当重试
    pub fn should_retry(&self, error: &DomainError, attempt: u32) -> bool {
        match &self.should_retry {
            Some(f) => f(error, attempt),
            None => error.is_retryable(),
        }
    }

    /// 第 `attempt` 次（从 1 开始）失败后的退避时长，未加抖动，已按上限截断
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let attempt = attempt.max(1);
        let delay = match self.backoff {
            BackoffKind::Exponential => self
                .initial_delay
                .saturating_mul(2u32.saturating_pow(attempt - 1)),
            BackoffKind::Linear => self.initial_delay.saturating_mul(attempt),
            BackoffKind::Fixed => self.initial_delay,
        };
        self.cap(delay)
    }

    /// 加入对称抖动 `±jitter * delay` 后的退避时长（毫秒向下取整）
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if self.jitter == 0.0 {
            return base;
        }

        let factor: f64 = rand::rng().random_range(-1.0..=1.0);
        self.cap(apply_jitter(base, self.jitter, factor))
    }

    fn cap(&self, delay: Duration) -> Duration {
        match self.max_delay {
            Some(max) => delay.min(max),
            None => delay,
        }
    }
}

/// `factor` 取自 `[-1, 1]` 的均匀分布
fn apply_jitter(delay: Duration, jitter: f64, factor: f64) -> Duration {
    let millis = delay.as_millis() as f64;
    let jittered = (millis + factor * jitter * millis).max(0.0).floor();
    Duration::from_millis(jittered as u64)
}

/// 可从配置文件反序列化的重试配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: BackoffKind,
    pub initial_delay_ms: u64,
    pub max_delay_ms: Option<u64>,
    pub jitter: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffKind::Exponential,
            initial_delay_ms: 100,
            max_delay_ms: Some(10_000),
            jitter: DEFAULT_JITTER,
        }
    }
}

impl TryFrom<RetryConfig> for RetryPolicy {
    type Error = DomainError;

    fn try_from(config: RetryConfig) -> Result<Self, Self::Error> {
        RetryPolicy::builder()
            .max_attempts(config.max_attempts)
            .backoff(config.backoff)
            .initial_delay(Duration::from_millis(config.initial_delay_ms))
            .maybe_max_delay(config.max_delay_ms.map(Duration::from_millis))
            .jitter(config.jitter)
            .build()
    }
}
