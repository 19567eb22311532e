//! Bounded retry with exponential backoff for upstream calls.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::GatewayError;
use crate::resilience::RateGovernor;

/// Retry discipline for one upstream operation.
///
/// Only classified-transient failures are retried (see
/// [`GatewayError::is_transient`]); permanent failures surface immediately.
/// Every attempt re-enters the governor's admission gate, so repeated
/// failures cannot be used to bypass quota.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempt budget, including the first try
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound on any single backoff delay
    pub max_delay: Duration,
    /// Multiplier applied per subsequent attempt
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Build a policy from configured retry count and base delay.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            ..Self::default()
        }
    }

    /// Execute `operation` under governor admission with bounded retries.
    ///
    /// On exhaustion the last transient failure is wrapped as
    /// [`GatewayError::UpstreamUnavailable`], except a persistent 429 which
    /// surfaces as [`GatewayError::RateLimited`] so callers can distinguish
    /// quota pressure from outages.
    pub async fn run<T, F, Fut>(
        &self,
        governor: &RateGovernor,
        mut operation: F,
    ) -> Result<T, GatewayError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GatewayError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            governor.admit().await;

            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!(attempt, "operation succeeded after transient failures");
                    }
                    return Ok(value);
                }
                Err(error) if error.is_transient() => {
                    if attempt >= max_attempts {
                        tracing::warn!(attempt, %error, "retries exhausted");
                        return Err(match error {
                            rate_limited @ GatewayError::RateLimited { .. } => rate_limited,
                            other => GatewayError::UpstreamUnavailable {
                                attempts: attempt,
                                source: Box::new(other),
                            },
                        });
                    }

                    let delay = self.backoff_delay(attempt, &error);
                    tracing::debug!(attempt, %error, ?delay, "transient failure, backing off");
                    sleep(delay).await;
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Exponential delay for the attempt that just failed, honoring an
    /// upstream Retry-After as a floor.
    fn backoff_delay(&self, attempt: u32, error: &GatewayError) -> Duration {
        let exp = self.base_delay.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
        let mut delay = Duration::from_secs_f64(exp.min(self.max_delay.as_secs_f64()));

        if let GatewayError::RateLimited {
            retry_after: Some(seconds),
        } = error
        {
            delay = delay.max(Duration::from_secs(*seconds));
        }

        delay
    }
}
