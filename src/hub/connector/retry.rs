use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::hub::core::traits::TransportError;

/// 重试策略
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryStrategy {
    /// 立即重试
    Immediate,

    /// 固定延迟重试
    FixedDelay { delay_ms: u64 },

    /// 指数退避重试
    ExponentialBackoff {
        initial_delay_ms: u64,
        max_delay_ms: u64,
        multiplier: f64,
    },
}

impl Default for RetryStrategy {
    fn default() -> Self {
        Self::Immediate
    }
}

impl RetryStrategy {
    /// 获取下一次重试前的延迟，立即重试返回 None
    pub fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self {
            RetryStrategy::Immediate => None,
            RetryStrategy::FixedDelay { delay_ms } => Some(Duration::from_millis(*delay_ms)),
            RetryStrategy::ExponentialBackoff {
                initial_delay_ms,
                max_delay_ms,
                multiplier,
            } => {
                let delay = (*initial_delay_ms as f64 * multiplier.powi(attempt as i32)) as u64;
                let delay = delay.min(*max_delay_ms);
                Some(Duration::from_millis(delay))
            }
        }
    }

    /// 创建指数退避策略
    pub fn exponential(initial_delay_ms: u64, max_delay_ms: u64, multiplier: f64) -> Self {
        Self::ExponentialBackoff {
            initial_delay_ms,
            max_delay_ms,
            multiplier,
        }
    }

    /// 创建固定延迟策略
    pub fn fixed(delay_ms: u64) -> Self {
        Self::FixedDelay { delay_ms }
    }
}

/// 可判断是否值得重试的错误
pub trait RetryableError: std::fmt::Display {
    fn is_transient(&self) -> bool;
}

impl RetryableError for TransportError {
    fn is_transient(&self) -> bool {
        TransportError::is_transient(self)
    }
}

/// 重试配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// 最大尝试次数（包含第一次）
    pub max_attempts: u32,

    /// 重试策略
    pub strategy: RetryStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            strategy: RetryStrategy::default(),
        }
    }
}

impl RetryConfig {
    /// 创建新的重试配置
    pub fn new(max_attempts: u32, strategy: RetryStrategy) -> Self {
        Self {
            max_attempts,
            strategy,
        }
    }

    /// 执行带重试的操作，非临时错误立即返回
    pub async fn execute<F, Fut, T, E>(&self, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: RetryableError,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        debug!("操作在第 {} 次尝试后成功", attempt);
                    }
                    return Ok(result);
                }
                Err(e) => {
                    warn!(attempt, "操作失败: {}", e);

                    if !e.is_transient() {
                        debug!("错误不可重试，放弃重试");
                        return Err(e);
                    }
                    if attempt >= max_attempts {
                        return Err(e);
                    }

                    if let Some(delay) = self.strategy.next_delay(attempt - 1) {
                        debug!("等待 {:?} 后重试", delay);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_exponential_backoff() {
        let strategy = RetryStrategy::exponential(1000, 10000, 2.0);

        assert_eq!(strategy.next_delay(0), Some(Duration::from_millis(1000)));
        assert_eq!(strategy.next_delay(1), Some(Duration::from_millis(2000)));
        assert_eq!(strategy.next_delay(3), Some(Duration::from_millis(8000)));
        assert_eq!(strategy.next_delay(4), Some(Duration::from_millis(10000)));
    }

    #[test]
    fn test_immediate_has_no_delay() {
        assert_eq!(RetryStrategy::Immediate.next_delay(0), None);
        assert_eq!(RetryStrategy::fixed(20).next_delay(5), Some(Duration::from_millis(20)));
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let config = RetryConfig::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let result = config
            .execute(|| {
                let attempts = Arc::clone(&attempts);
                async move {
                    let count = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                    if count < 3 {
                        Err(TransportError::Transient("timeout".to_string()))
                    } else {
                        Ok(count)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_stops_after_max_attempts() {
        let config = RetryConfig::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = config
            .execute(|| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::Transient("reset".to_string()))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rejected_is_not_retried() {
        let config = RetryConfig::default();
        let attempts = Arc::new(AtomicU32::new(0));

        let result: Result<(), _> = config
            .execute(|| {
                let attempts = Arc::clone(&attempts);
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err(TransportError::Rejected("bad frame".to_string()))
                }
            })
            .await;

        assert_eq!(result, Err(TransportError::Rejected("bad frame".to_string())));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
