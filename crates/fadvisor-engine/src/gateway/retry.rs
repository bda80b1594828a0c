//! Retry logic with exponential backoff
//!
//! Only `RateLimited` failures are retried; every other error is returned
//! on the first attempt.

use super::MarketDataGateway;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::model::{HistoryRange, Instrument, PriceHistory};
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,

    /// Initial backoff duration
    pub initial_backoff: Duration,

    /// Maximum backoff duration
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl RetryPolicy {
    /// Policy derived from `max_retries` and the backoff settings
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_retries,
            initial_backoff: config.retry_backoff_base,
            max_backoff: config.retry_backoff_max,
        }
    }

    /// Create a policy with no retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time
    fn backoff_duration(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2_u32.saturating_pow(attempt - 1);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Execute an async operation, retrying rate-limited failures
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(
                            "Operation '{}' succeeded after {} retries",
                            operation_name,
                            attempt - 1
                        );
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = self.backoff_duration(attempt);
                    warn!(
                        "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation_name, attempt, max_attempts, e, backoff
                    );
                    sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Gateway decorator applying a [`RetryPolicy`] to every call
pub struct RetryingGateway<G> {
    inner: G,
    policy: RetryPolicy,
}

impl<G: MarketDataGateway> RetryingGateway<G> {
    pub fn new(inner: G, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<G: MarketDataGateway> MarketDataGateway for RetryingGateway<G> {
    async fn fetch_instrument(&self, symbol: &str) -> Result<Instrument> {
        self.policy
            .execute("fetch_instrument", || self.inner.fetch_instrument(symbol))
            .await
    }

    async fn fetch_history(&self, symbol: &str, range: HistoryRange) -> Result<PriceHistory> {
        self.policy
            .execute("fetch_history", || self.inner.fetch_history(symbol, range))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdvisorError;
    use crate::gateway::MockMarketDataGateway;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(100),
        }
    }

    fn rate_limited() -> AdvisorError {
        AdvisorError::RateLimited {
            provider: "test".to_string(),
        }
    }

    #[test]
    fn test_backoff_calculation() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(500),
        };

        assert_eq!(policy.backoff_duration(0), Duration::ZERO);
        assert_eq!(policy.backoff_duration(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_duration(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_duration(3), Duration::from_millis(400));
        assert_eq!(policy.backoff_duration(4), Duration::from_millis(500));
    }

    #[test]
    fn test_policy_from_config() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_rate_limited_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let mut mock = MockMarketDataGateway::new();
        mock.expect_fetch_instrument().returning(move |symbol| {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(rate_limited())
            } else {
                Ok(Instrument::new(symbol, 42.0))
            }
        });

        let gateway = RetryingGateway::new(mock, fast_policy());
        let instrument = assert_ok!(gateway.fetch_instrument("AAPL").await);
        assert_eq!(instrument.price, 42.0);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_attempts() {
        let mut mock = MockMarketDataGateway::new();
        mock.expect_fetch_instrument()
            .times(3)
            .returning(|_| Err(rate_limited()));

        let gateway = RetryingGateway::new(mock, fast_policy());
        let err = assert_err!(gateway.fetch_instrument("AAPL").await);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_does_not_retry_unavailable() {
        let mut mock = MockMarketDataGateway::new();
        mock.expect_fetch_instrument()
            .times(1)
            .returning(|symbol| Err(AdvisorError::unavailable(symbol, "unknown symbol")));

        let gateway = RetryingGateway::new(mock, fast_policy());
        let err = assert_err!(gateway.fetch_instrument("NOPE").await);
        assert!(matches!(err, AdvisorError::DataUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let mut mock = MockMarketDataGateway::new();
        mock.expect_fetch_instrument()
            .times(1)
            .returning(|_| Err(rate_limited()));

        let gateway = RetryingGateway::new(mock, RetryPolicy::no_retry());
        assert_err!(gateway.fetch_instrument("AAPL").await);
    }
}
