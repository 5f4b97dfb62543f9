use crate::error::{ErrorKind, TransportError};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub exponential_base: f64,
    pub retryable_status_codes: BTreeSet<u16>,
    pub retryable_error_kinds: BTreeSet<ErrorKind>,
    /// Upper bound of the random extra wait added to each backoff sleep.
    pub jitter_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            exponential_base: 2.0,
            retryable_status_codes: [408, 429, 500, 502, 503, 504].into_iter().collect(),
            retryable_error_kinds: [ErrorKind::Network, ErrorKind::ExternalService]
                .into_iter()
                .collect(),
            jitter_ms: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
}

#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Whether `err` is classified retryable, ignoring the attempt budget.
    pub fn is_retryable(&self, err: &TransportError) -> bool {
        err.is_retryable_by(&self.config)
    }

    /// `min(max_delay, base_delay * exponential_base^(attempt - 1))`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay = self.config.base_delay_ms as f64 * self.config.exponential_base.powi(exponent);
        let capped = delay.min(self.config.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }

    /// Decides what to do after attempt number `attempt` (1-based) failed with `err`.
    pub fn decide(&self, attempt: u32, err: &TransportError) -> RetryDecision {
        let retry = attempt < self.config.max_attempts && self.is_retryable(err);
        RetryDecision {
            retry,
            delay: if retry { self.backoff(attempt) } else { Duration::ZERO },
        }
    }

    /// Runs `operation` until it succeeds, fails terminally, or the attempt
    /// budget is spent. The attempt number is passed to each invocation.
    ///
    /// The backoff sleep returns [`TransportError::Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn retry<F, Fut, T>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> Result<T, TransportError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(result) => {
                    if attempt > 1 {
                        info!("Operation succeeded after {} attempts", attempt);
                    }
                    return Ok(result);
                }
                Err(err) => {
                    let decision = self.decide(attempt, &err);
                    if !decision.retry {
                        if attempt > 1 {
                            warn!("Operation failed after {} attempts: {}", attempt, err);
                        }
                        return Err(err);
                    }

                    let delay = decision.delay + self.jitter();
                    warn!(
                        "Attempt {} failed: {}. Retrying in {:?}...",
                        attempt, err, delay
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(TransportError::Cancelled),
                        _ = sleep(delay) => {}
                    }
                }
            }
        }
    }

    fn jitter(&self) -> Duration {
        if self.config.jitter_ms == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis((rand::random::<f64>() * self.config.jitter_ms as f64) as u64)
    }
}
