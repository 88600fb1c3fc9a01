//! # Retry Policy
//!
//! Every remote call gets at most two attempts: the original and one retry,
//! and only when the first failure was a transport problem.
//!
//! ```text
//! attempt 1 ──► Ok ─────────────────────────────► Ok
//!     │
//!     └─► Err (retryable) ──► wait ──► attempt 2 ──► Ok / Err
//!     │
//!     └─► Err (not retryable) ──────────────────► Err
//! ```

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::error::ClientResult;

/// Attempts per remote call, original included.
pub const MAX_ATTEMPTS: u32 = 2;

/// Retry settings for remote calls. Only the delays are tunable; the
/// attempt count never exceeds [`MAX_ATTEMPTS`].
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound on any wait.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// The standard two-attempt policy with a custom first delay.
    pub fn with_delay(initial_delay: Duration) -> Self {
        Self {
            initial_delay,
            ..Self::default()
        }
    }

    /// Total attempts, original included.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.clamp(1, MAX_ATTEMPTS)
    }

    fn create_backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial_delay,
            initial_interval: self.initial_delay,
            max_interval: self.max_delay,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Runs `op` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. Returns the last error.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, operation: &str, mut op: F) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut backoff = policy.create_backoff();
    let max_attempts = policy.max_attempts();
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts && error.is_retryable() => {
                let delay = backoff.next_backoff().unwrap_or(policy.max_delay);
                warn!(
                    target: "taxcloud",
                    operation,
                    attempt,
                    max_attempts,
                    error = %error,
                    delay_ms = delay.as_millis() as u64,
                    "Remote call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => return Err(error),
        }
    }
}
