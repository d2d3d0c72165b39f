use crate::config::ReliabilityConfig;
use crate::error::{ChatError, SourceError};
use std::future::Future;
use std::time::Duration;

/// Errors that can signal a remote rate limit.
pub trait RateLimitSignal: Sized {
    fn is_rate_limited(&self) -> bool;

    /// Terminal error once the attempt budget is spent.
    fn exhausted(endpoint: &str, attempts: u32) -> Self;
}

impl RateLimitSignal for ChatError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn exhausted(endpoint: &str, attempts: u32) -> Self {
        Self::RateLimitExhausted {
            endpoint: endpoint.to_string(),
            attempts,
        }
    }
}

impl RateLimitSignal for SourceError {
    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    fn exhausted(endpoint: &str, attempts: u32) -> Self {
        Self::RateLimitExhausted {
            endpoint: endpoint.to_string(),
            attempts,
        }
    }
}

/// Fixed-backoff retry budget applied to rate-limited remote calls only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RateLimitPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn from_config(config: &ReliabilityConfig) -> Self {
        Self::new(
            config.rate_limit_attempts,
            Duration::from_millis(config.rate_limit_backoff_ms),
        )
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(30))
    }
}

/// Run `call` until it succeeds, fails with a non-rate-limit error, or the
/// attempt budget runs out.
pub async fn with_rate_limit<T, E, F, Fut>(
    policy: RateLimitPolicy,
    endpoint: &str,
    mut call: F,
) -> Result<T, E>
where
    E: RateLimitSignal,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    for attempt in 1..=policy.max_attempts {
        match call().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(endpoint, attempt, "call recovered after rate limiting");
                }
                return Ok(value);
            }
            Err(e) if e.is_rate_limited() => {
                if attempt < policy.max_attempts {
                    tracing::warn!(
                        endpoint,
                        attempt,
                        max_attempts = policy.max_attempts,
                        backoff_ms = u64::try_from(policy.backoff.as_millis()).unwrap_or(u64::MAX),
                        "rate limited, backing off"
                    );
                    tokio::time::sleep(policy.backoff).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    tracing::warn!(endpoint, attempts = policy.max_attempts, "rate-limit retries exhausted");
    Err(E::exhausted(endpoint, policy.max_attempts))
}
