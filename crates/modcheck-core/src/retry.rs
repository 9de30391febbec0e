//! Bounded retry with deterministic exponential backoff
//!
//! Only errors a [`RetryClassifier`] deems transient are retried. Every
//! policy has a hard attempt ceiling; there is no infinite mode.

use crate::error::ProvisionError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

/// Retry configuration for engine operations
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one (at least 1)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_delay: Duration,

    /// Maximum delay between retries
    pub max_delay: Duration,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_delay(mut self, initial_delay: Duration) -> Self {
        self.initial_delay = initial_delay;
        self
    }

    /// Effective attempt ceiling
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before retry number `attempt` (0-based), capped at `max_delay`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self.backoff_multiplier.max(1.0).powi(attempt as i32);
        let secs = (self.initial_delay.as_secs_f64() * factor).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(secs).unwrap_or(self.max_delay)
    }
}

/// Decides whether a provisioning error is transient
///
/// Implemented for plain closures so callers can inject ad-hoc predicates.
pub trait RetryClassifier: Send + Sync {
    fn is_retryable(&self, error: &ProvisionError) -> bool;
}

impl<F> RetryClassifier for F
where
    F: Fn(&ProvisionError) -> bool + Send + Sync,
{
    fn is_retryable(&self, error: &ProvisionError) -> bool {
        self(error)
    }
}

/// Classifier that treats every error as fatal
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverRetry;

impl RetryClassifier for NeverRetry {
    fn is_retryable(&self, _error: &ProvisionError) -> bool {
        false
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// the attempt ceiling is reached. Returns the last error on failure.
pub async fn retry_with_backoff<F, Fut, T>(
    config: &RetryConfig,
    classifier: &dyn RetryClassifier,
    operation_name: &str,
    operation: F,
) -> Result<T, ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProvisionError>>,
{
    let never = CancellationToken::new();
    retry_until_cancelled(config, classifier, operation_name, &never, operation).await
}

/// [`retry_with_backoff`] that stops retrying once `cancel` fires.
///
/// A cancelled backoff sleep returns `Interrupted` without another attempt.
/// An `Interrupted` error from the operation is never retried, whatever the
/// classifier says.
pub async fn retry_until_cancelled<F, Fut, T>(
    config: &RetryConfig,
    classifier: &dyn RetryClassifier,
    operation_name: &str,
    cancel: &CancellationToken,
    mut operation: F,
) -> Result<T, ProvisionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProvisionError>>,
{
    let max_attempts = config.attempts();
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if e.is_interrupted() || !classifier.is_retryable(&e) {
                    return Err(e);
                }

                if attempt >= max_attempts {
                    error!(
                        operation = %operation_name,
                        attempt = attempt,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt - 1);
                warn!(
                    operation = %operation_name,
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    delay_ms = delay.as_millis() as u64,
                    "Retryable error, retrying"
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        warn!(operation = %operation_name, "Cancelled while backing off");
                        return Err(ProvisionError::Interrupted {
                            command: operation_name.to_string(),
                        });
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}
