//! Retry orchestration with exponential backoff.
//!
//! Delays follow `min(base * factor^(attempt - 1), max)` with attempts
//! counted from 1. Jitter is supported but off by default, keeping the delay
//! sequence deterministic. The orchestrator observes the cancellation token
//! both between attempts and during the backoff sleep; a cancellation is
//! terminal and silent.

use std::time::Duration;

use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::{AppError, ErrorKind, FetchError};

/// Backoff strategy between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Fixed delay between retries.
    Fixed {
        delay: Duration,
    },
    /// Exponential delay: `base * (factor ^ retry_index)`, capped at `max`.
    Exponential {
        base: Duration,
        factor: f64,
        max: Duration,
        /// Apply +/- 50% random jitter to each delay.
        jitter: bool,
    },
}

impl Default for Backoff {
    fn default() -> Self {
        Self::Exponential {
            base: Duration::from_millis(1_000),
            factor: 2.0,
            max: Duration::from_secs(10),
            jitter: false,
        }
    }
}

impl Backoff {
    /// Delay before the retry with the given 0-based index (the delay after
    /// attempt `retry_index + 1` failed).
    pub fn delay(self, retry_index: u32) -> Duration {
        match self {
            Self::Fixed { delay } => delay,
            Self::Exponential {
                base,
                factor,
                max,
                jitter,
            } => {
                let scale = factor.powi(retry_index as i32);
                let seconds = base.as_secs_f64() * scale;
                let capped_seconds = seconds.min(max.as_secs_f64()).max(0.0);

                let mut delay = Duration::from_secs_f64(capped_seconds);

                if jitter {
                    let jitter_ms = (delay.as_millis() as f64 * 0.5) as u64;
                    let offset = fastrand::u64(0..=(jitter_ms * 2));
                    let total_ms = delay.as_millis() as i64 + (offset as i64 - jitter_ms as i64);
                    delay = Duration::from_millis(total_ms.max(0) as u64);
                }

                delay
            }
        }
    }
}

/// Declarative retry policy consulted by [`run_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// When false the policy degenerates to a single attempt.
    pub enabled: bool,
    /// Maximum number of retries; total attempts = `max_retries + 1`.
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Status codes eligible for retry, on top of the classifier's
    /// retryable flag.
    pub retry_on_status: Vec<u16>,
    pub retry_on_timeout: bool,
    pub retry_on_connect: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 3,
            backoff: Backoff::default(),
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
            retry_on_timeout: true,
            retry_on_connect: true,
        }
    }
}

impl RetryConfig {
    /// Exponential-backoff policy with a custom retry budget.
    pub fn exponential(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// Fixed-delay policy.
    pub fn fixed(delay: Duration, max_retries: u32) -> Self {
        Self {
            max_retries,
            backoff: Backoff::Fixed { delay },
            ..Self::default()
        }
    }

    /// Single-attempt policy.
    pub fn no_retry() -> Self {
        Self {
            enabled: false,
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Whether a classified failure is eligible for another attempt under
    /// this policy.
    pub fn should_retry(&self, error: &AppError) -> bool {
        if !self.enabled {
            return false;
        }
        match error.kind {
            ErrorKind::Timeout => self.retry_on_timeout,
            ErrorKind::Network => self.retry_on_connect,
            // Every 5xx is transient as far as the classifier is concerned;
            // the status table only extends retry to non-server statuses
            // such as 408.
            ErrorKind::Server => error.retryable,
            _ => match error.status_code {
                Some(status) => error.retryable && self.retry_on_status.contains(&status),
                None => error.retryable,
            },
        }
    }

    pub fn delay_for_retry(&self, retry_index: u32) -> Duration {
        self.backoff.delay(retry_index)
    }
}

/// Drive `operation` until it succeeds, the policy gives up, or the token is
/// cancelled.
///
/// `operation` receives the 1-based attempt number and returns an already
/// classified outcome. `on_retry` fires once per scheduled retry, before the
/// backoff sleep, with the attempt that just failed; UIs use it to surface
/// "retrying" feedback.
pub async fn run_with_retry<T, F, Fut, R>(
    config: &RetryConfig,
    token: &CancelToken,
    mut operation: F,
    mut on_retry: R,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<T, FetchError>>,
    R: FnMut(u32, &AppError),
{
    let max_attempts = config.max_retries.saturating_add(1);
    let mut attempt: u32 = 1;

    loop {
        if token.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let error = match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
            Err(FetchError::Failed(error)) => error,
        };

        if attempt >= max_attempts || !config.should_retry(&error) || token.is_cancelled() {
            return Err(FetchError::Failed(error));
        }

        let delay = config.delay_for_retry(attempt - 1);
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            kind = %error.kind,
            "attempt failed, backing off before retry"
        );
        on_retry(attempt, &error);

        tokio::select! {
            _ = token.cancelled() => return Err(FetchError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
    }
}
