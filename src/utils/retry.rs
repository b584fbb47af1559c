//! Retry utilities with increasing backoff for calls to external services.

use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each further failure
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Set the maximum number of attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the initial delay
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Backoff delay to wait after the given (1-based) failed attempt
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return self.initial_delay.min(self.max_delay);
        }
        let exp_delay = self.initial_delay.as_secs_f64()
            * self.backoff_multiplier.powf(attempt as f64 - 1.0);
        Duration::from_secs_f64(exp_delay.min(self.max_delay.as_secs_f64()))
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Rate limit exceeded (with optional retry-after seconds)
    RateLimit(Option<u64>),
    /// Server error (5xx)
    ServerError,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Classify an HTTP status code
    pub fn from_status(status: reqwest::StatusCode, retry_after: Option<u64>) -> Option<Self> {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Some(TransientError::RateLimit(retry_after));
        }
        if status == reqwest::StatusCode::REQUEST_TIMEOUT
            || status == reqwest::StatusCode::GATEWAY_TIMEOUT
        {
            return Some(TransientError::Timeout);
        }
        if status.is_server_error() {
            return Some(TransientError::ServerError);
        }
        None
    }

    /// Delay requested by the remote side, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            TransientError::RateLimit(Some(seconds)) => Some(Duration::from_secs(*seconds)),
            _ => None,
        }
    }
}

/// Errors that know whether they are worth retrying
pub trait Retryable {
    /// `Some` when the failure is transient
    fn transient(&self) -> Option<TransientError>;
}

/// Execute an async operation with retry logic
///
/// Permanent errors return immediately. Transient errors are retried until
/// `config.max_attempts` attempts have been made; the last error is returned.
/// The operation is never called more than `max_attempts` times.
pub async fn with_retry<T, E, F, Fut>(config: RetryConfig, mut operation: F) -> Result<T, E>
where
    E: Retryable + Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Err(error) => {
                let Some(transient) = error.transient() else {
                    return Err(error);
                };

                if attempts >= config.max_attempts {
                    tracing::warn!("Giving up after {} attempts: {}", attempts, error);
                    return Err(error);
                }

                let mut delay = config.delay_after(attempts);
                if let Some(requested) = transient.retry_after() {
                    delay = delay.max(requested.min(config.max_delay));
                }

                tracing::warn!(
                    "Transient error on attempt {}/{}: {}, retrying in {:?}",
                    attempts,
                    config.max_attempts,
                    error,
                    delay
                );

                sleep(delay).await;
            }
        }
    }
}
