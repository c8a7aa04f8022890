//! 重试策略
//!
//! 所有调用点共用一份参数化的重试规则：最大重试次数、基础等待、
//! 退避方式、以及"哪些错误值得重试"的判定函数。

use crate::error::AppError;
use std::fmt;
use std::time::Duration;

/// 退避方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// 第 n 次重试等待 `base * n`
    Linear,
    /// 第 n 次重试等待 `base * factor^(n-1)`
    Exponential { factor: u32 },
}

/// 重试策略
#[derive(Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff: Backoff,
    /// 判定错误是否可重试
    pub retry_on: fn(&AppError) -> bool,
}

impl RetryPolicy {
    /// 线性退避，只重试限流错误
    pub fn linear(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff: Backoff::Linear,
            retry_on: AppError::is_rate_limited,
        }
    }

    /// 指数退避，只重试限流错误
    pub fn exponential(max_retries: u32, base_delay: Duration, factor: u32) -> Self {
        Self {
            max_retries,
            base_delay,
            backoff: Backoff::Exponential {
                factor: factor.max(2),
            },
            retry_on: AppError::is_rate_limited,
        }
    }

    /// 替换重试判定
    pub fn retry_when(mut self, predicate: fn(&AppError) -> bool) -> Self {
        self.retry_on = predicate;
        self
    }

    /// 第 `retry` 次重试（从 1 开始）前的等待时长
    pub fn delay_for(&self, retry: u32) -> Duration {
        let retry = retry.max(1);
        match self.backoff {
            Backoff::Linear => self.base_delay.saturating_mul(retry),
            Backoff::Exponential { factor } => self
                .base_delay
                .saturating_mul(factor.saturating_pow(retry - 1)),
        }
    }

    /// 已经重试了 `retries_so_far` 次之后又遇到 `error`：
    /// 返回下一次重试前的等待时长，`None` 表示放弃
    pub fn should_retry(&self, retries_so_far: u32, error: &AppError) -> Option<Duration> {
        if retries_so_far >= self.max_retries || !(self.retry_on)(error) {
            return None;
        }
        Some(self.delay_for(retries_so_far + 1))
    }

    /// 最多尝试次数（首次 + 重试）
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::linear(3, Duration::from_millis(2000))
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_backoff_grows_with_retry_count() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(6000));
    }

    #[test]
    fn test_exponential_backoff() {
        let policy = RetryPolicy::exponential(4, Duration::from_millis(500), 2);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4000));
    }

    #[test]
    fn test_only_rate_limits_are_retried() {
        let policy = RetryPolicy::default();
        let throttled = AppError::rate_limited("m", "429");
        let other = AppError::Other("boom".into());

        assert_eq!(policy.should_retry(0, &throttled), Some(Duration::from_millis(2000)));
        assert_eq!(policy.should_retry(2, &throttled), Some(Duration::from_millis(6000)));
        assert_eq!(policy.should_retry(3, &throttled), None);
        assert_eq!(policy.should_retry(0, &other), None);
    }

    #[test]
    fn test_custom_predicate() {
        let policy = RetryPolicy::default().retry_when(|_| true);
        assert!(policy.should_retry(0, &AppError::Other("x".into())).is_some());
        assert_eq!(policy.max_attempts(), 4);
    }
}
