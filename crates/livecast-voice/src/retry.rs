//! Bounded retry with credential rotation between attempts.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::backend::CompletionBackend;
use crate::credentials::{CredentialRotator, FailureReason};
use crate::error::{UpstreamError, VoiceError};

/// How many times, how long, and how far apart upstream calls are tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Bound on one attempt. Elapsing counts as a transport failure.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_base: Duration::from_millis(500),
            backoff_max: Duration::from_secs(8),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`,
    /// capped at `backoff_max`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }
}

/// Upstream access shared by the script generator and the synthesizer.
#[derive(Clone)]
pub struct UpstreamClient {
    rotator: Arc<CredentialRotator>,
    backend: Arc<dyn CompletionBackend>,
    policy: RetryPolicy,
}

impl UpstreamClient {
    pub fn new(
        rotator: Arc<CredentialRotator>,
        backend: Arc<dyn CompletionBackend>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            rotator,
            backend,
            policy,
        }
    }

    pub fn rotator(&self) -> &Arc<CredentialRotator> {
        &self.rotator
    }

    /// Sends `body` until `parse` accepts a response or attempts run out.
    ///
    /// Each attempt acquires its own key, so a rate-limited or rejected key
    /// is rotated out before the next try. Running out of keys ends the call
    /// immediately with [`VoiceError::NoCredentialsAvailable`].
    pub async fn call<T, F>(
        &self,
        operation: &str,
        body: &Value,
        parse: F,
    ) -> Result<T, VoiceError>
    where
        F: Fn(&Value) -> Result<T, UpstreamError>,
    {
        let attempts = self.policy.max_attempts.max(1);
        let mut last_error: Option<UpstreamError> = None;

        for attempt in 1..=attempts {
            let key = self.rotator.acquire()?;

            let outcome = match tokio::time::timeout(
                self.policy.attempt_timeout,
                self.backend.complete(&key, body),
            )
            .await
            {
                Ok(Ok(response)) => parse(&response),
                Ok(Err(e)) => Err(e),
                Err(_) => Err(UpstreamError::Transport(format!(
                    "no response within {}ms",
                    self.policy.attempt_timeout.as_millis()
                ))),
            };

            match outcome {
                Ok(value) => {
                    self.rotator.report_success(&key);
                    if attempt > 1 {
                        tracing::info!(operation, attempt, "upstream call succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => {
                    let reason = match &e {
                        UpstreamError::RateLimited { retry_after } => FailureReason::RateLimited {
                            retry_after: *retry_after,
                        },
                        UpstreamError::InvalidCredential(_) => FailureReason::Invalid,
                        UpstreamError::Transport(_) | UpstreamError::Malformed(_) => {
                            FailureReason::Transient
                        }
                    };
                    self.rotator.report_failure(&key, reason);

                    if attempt < attempts {
                        let delay = self.policy.delay_after(attempt);
                        tracing::warn!(
                            operation,
                            attempt,
                            max_attempts = attempts,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "upstream attempt failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let detail = last_error.map(|e| e.to_string()).unwrap_or_default();
        tracing::warn!(operation, attempts, error = %detail, "upstream call gave up");
        Err(VoiceError::GenerationFailed(format!(
            "{operation} failed after {attempts} attempts: {detail}"
        )))
    }
}
