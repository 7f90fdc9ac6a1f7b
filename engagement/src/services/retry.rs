//! Timeout and retry wrappers for calls into the cache and the ledger.

use crate::config::CounterCfg;
use crate::errors::EngagementError;
use log::warn;
use std::future::Future;
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub attempts: u32,
    pub delay: Duration,
    pub exponential_backoff: bool,
}

impl From<&CounterCfg> for RetryPolicy {
    fn from(cfg: &CounterCfg) -> Self {
        Self {
            timeout: cfg.request_timeout(),
            attempts: cfg.retry_attempts,
            delay: cfg.retry_delay(),
            exponential_backoff: cfg.exponential_backoff,
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32) -> Duration {
        if self.exponential_backoff {
            self.delay * 2_u32.saturating_pow(attempt - 1)
        } else {
            self.delay
        }
    }
}

/// Fails with [`EngagementError::Timeout`] if `operation` does not finish within `timeout`.
pub async fn with_timeout<T, Fut>(timeout: Duration, name: &str, operation: Fut) -> Result<T, EngagementError>
where
    Fut: Future<Output = Result<T, EngagementError>>,
{
    match tokio::time::timeout(timeout, operation).await {
        Ok(res) => res,
        Err(_) => Err(EngagementError::Timeout(format!("{} exceeded {:?}", name, timeout))),
    }
}

/// Runs `operation` under the policy timeout, retrying retryable failures with backoff.
/// Only use it for operations that are safe to repeat.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, name: &str, mut operation: F) -> Result<T, EngagementError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngagementError>>,
{
    let mut attempt = 0;

    loop {
        if attempt > 0 {
            tokio::time::sleep(policy.delay_for(attempt)).await;
        }

        match with_timeout(policy.timeout, name, operation()).await {
            Ok(res) => return Ok(res),
            Err(e) if e.is_retryable() && attempt < policy.attempts => {
                attempt += 1;
                warn!("[{}] attempt {} of {} failed: {}", name, attempt, policy.attempts, e);
            }
            Err(e) => return Err(e),
        }
    }
}
