//! Retry with exponential backoff and jitter for auxiliary downloads.

use std::future::Future;
use std::time::Duration;

use crate::error::ConvertError;

/// Retry policy for idempotent requests such as `@require` and GreasyFork
/// downloads. Model turns are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that tries exactly once.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the next attempt. A server-provided `retry_after` wins
    /// over the computed backoff, capped at `max_backoff`.
    fn delay_for(&self, error: &ConvertError, backoff: Duration) -> Duration {
        if let ConvertError::RateLimited {
            retry_after_ms: Some(ms),
            ..
        } = error
        {
            return Duration::from_millis(*ms).min(self.max_backoff);
        }
        // 75%-125% of backoff
        let jitter = 0.75 + rand_factor() * 0.5;
        Duration::from_secs_f64(backoff.as_secs_f64() * jitter)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable error,
    /// or runs out of attempts. `label` names the operation in logs.
    pub async fn execute<F, Fut, T>(&self, label: &str, mut operation: F) -> Result<T, ConvertError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ConvertError>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            if !error.is_retryable() || attempt >= attempts {
                return Err(error);
            }

            let delay = self.delay_for(&error, backoff);
            tracing::warn!(
                operation = label,
                attempt,
                max_attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after error"
            );
            tokio::time::sleep(delay).await;

            backoff = Duration::from_secs_f64(
                (backoff.as_secs_f64() * self.multiplier).min(self.max_backoff.as_secs_f64()),
            );
            attempt += 1;
        }
    }
}

/// Pseudo-random factor in [0, 1) from the clock and thread id.
fn rand_factor() -> f64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut hasher = DefaultHasher::new();
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
        .hash(&mut hasher);
    std::thread::current().id().hash(&mut hasher);

    (hasher.finish() % 10_000) as f64 / 10_000.0
}
