use super::config::RetryConfig;
use super::error::AppError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

/// 一時的なストアエラーに対する指数バックオフ付き再試行ポリシー
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// 再試行しないポリシー
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// `operation` を実行し、`TransientStore` の場合のみバックオフして再試行する
    pub async fn run<T, F, Fut>(&self, operation: &str, mut f: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        target: "forum::retry",
                        operation,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient store failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// ストア呼び出しにタイムアウトを付与する。超過時は `TransientStore`
pub async fn with_timeout<T, Fut>(
    duration: Duration,
    operation: &str,
    fut: Fut,
) -> Result<T, AppError>
where
    Fut: Future<Output = Result<T, AppError>>,
{
    match timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(AppError::timeout(operation)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        }
    }

    #[test]
    fn delay_grows_exponentially_and_is_capped() {
        let policy = fast_policy(5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(1));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4));
        assert_eq!(policy.delay_for(4), Duration::from_millis(4));
    }

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result = fast_policy(3)
            .run("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(AppError::TransientStore("busy".into()))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_errors_surface_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&calls);
        let result: Result<(), AppError> = fast_policy(5)
            .run("test", || {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(AppError::NotFound("thread".into()))
                }
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_is_reported_as_transient() {
        let result: Result<(), AppError> =
            with_timeout(Duration::from_millis(5), "slow_call", async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(AppError::TransientStore(_))));
    }
}
