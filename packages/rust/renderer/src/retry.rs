//! Small reusable retry policy for I/O calls with per-attempt timeouts.

use std::time::Duration;

use tracing::debug;

use crate::{FailureKind, RenderFailure};

/// Retry policy: a fixed number of attempts with a timeout that doubles on
/// each subsequent attempt.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Timeout applied to attempt 0.
    pub base_timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_timeout,
        }
    }

    /// Timeout for the given zero-based attempt: `base * 2^attempt`.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        self.base_timeout.saturating_mul(1u32 << attempt.min(16))
    }
}

/// Drive `attempt` under the policy. Only timeout-classified failures are
/// retried; each retry runs with the policy's grown timeout.
pub(crate) async fn retry_timeouts<T, F, Fut>(
    policy: RetryPolicy,
    mut attempt: F,
) -> std::result::Result<T, RenderFailure>
where
    F: FnMut(u32, Duration) -> Fut,
    Fut: Future<Output = std::result::Result<T, RenderFailure>>,
{
    let mut attempt_no = 0;
    loop {
        match attempt(attempt_no, policy.timeout_for(attempt_no)).await {
            Ok(value) => return Ok(value),
            Err(failure)
                if failure.kind == FailureKind::Timeout
                    && attempt_no + 1 < policy.max_attempts =>
            {
                debug!(
                    attempt = attempt_no,
                    "navigation timed out, retrying with doubled timeout"
                );
                attempt_no += 1;
            }
            Err(failure) => return Err(failure),
        }
    }
}
