//! Bounded retry with exponential backoff around provider calls.
//!
//! The delay is the larger of the backend's retry-after hint and
//! `initial_backoff * 2^(attempt - 1)`, capped at `max_backoff`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::events::{RunEvent, RunObserver};
use super::state::AbortReason;
use crate::config::RetryConfig;
use crate::error::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
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
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Single attempt, no waiting
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 2u32.saturating_pow(attempt.saturating_sub(1).min(16));
        self.initial_backoff.saturating_mul(exp).min(self.max_backoff)
    }

    fn delay_for(&self, attempt: u32, error: &ProviderError) -> Duration {
        let backoff = self.backoff(attempt);
        match error.retry_after() {
            Some(hint) => hint.min(self.max_backoff).max(backoff),
            None => backoff,
        }
    }
}

/// Run `call` until it succeeds, fails permanently, runs out of attempts,
/// or `cancel` fires. Cancellation also interrupts an in-flight call.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    cancel: &CancellationToken,
    observer: &dyn RunObserver,
    mut call: F,
) -> Result<T, AbortReason>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(AbortReason::Cancelled),
            result = call() => result,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };

        if !error.is_retryable() || attempt >= policy.max_attempts {
            return Err(AbortReason::Provider(error));
        }

        let delay = policy.delay_for(attempt, &error);
        observer.on_event(&RunEvent::RetryScheduled {
            operation: operation.to_string(),
            attempt,
            delay,
            error: error.to_string(),
        });

        tokio::select! {
            _ = cancel.cancelled() => return Err(AbortReason::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
