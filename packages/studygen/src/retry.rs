//! One retry/backoff policy shared by every LLM call site.
//!
//! A single configurable policy injected into one call primitive, instead
//! of a hand-rolled loop per endpoint.

use std::future::Future;
use std::time::Duration;

use anthropic_client::LlmError;
use tracing::warn;

/// Retry policy for outbound LLM calls.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempt ceiling (first call included)
    pub max_attempts: u32,

    /// Base delay for exponential backoff (doubles per attempt)
    pub base_delay: Duration,

    /// Longer fixed delay when the provider is rate limiting
    pub rate_limit_delay: Duration,

    /// Per-call time ceiling; an elapsed call is treated as transient
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            rate_limit_delay: Duration::from_secs(20),
            call_timeout: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    fn delay_for(&self, attempt: u32, error: &LlmError) -> Duration {
        if error.is_rate_limited() {
            self.rate_limit_delay
        } else {
            self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
        }
    }
}

/// Run `op` under the policy: per-attempt timeout, exponential backoff on
/// transient errors, immediate propagation of everything else. The last
/// error is returned unmodified once the attempt ceiling is hit.
pub async fn call<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, LlmError>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;

        let result = match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(LlmError::Timeout(policy.call_timeout.as_secs())),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt, &error);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "transient LLM error, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}
