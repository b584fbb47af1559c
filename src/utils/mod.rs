//! Utility modules shared by the resolver, fetch client and classifier.
//!
//! - [`HttpClient`]: HTTP client with sensible defaults
//! - [`Pacer`]: process-wide minimum interval between requests to one service
//! - [`RetryConfig`]: Configuration for retry logic with increasing backoff
//! - [`with_retry`]: Execute an operation with automatic retry on transient errors
//!
//! # Retry with Backoff
//!
//! ```rust,no_run
//! use dric_check::utils::{with_retry, RetryConfig, Retryable, TransientError};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("busy")]
//! struct Busy;
//!
//! impl Retryable for Busy {
//!     fn transient(&self) -> Option<TransientError> {
//!         Some(TransientError::RateLimit(None))
//!     }
//! }
//!
//! # async fn call() -> Result<String, Busy> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() {
//! let config = RetryConfig::default().max_attempts(3);
//! let result = with_retry(config, || call()).await;
//! # }
//! ```

mod http;
mod pace;
mod retry;

pub use http::{retry_after_secs, HttpClient};
pub use pace::Pacer;
pub use retry::{with_retry, RetryConfig, Retryable, TransientError};
