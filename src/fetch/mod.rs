//! Content fetching with pacing, bounded retries and a per-URL memo.
//!
//! [`FetchClient`] wraps a black-box [`ContentService`]. Every request first
//! waits on the shared [`Pacer`]; transient failures (timeouts, rate limits,
//! 5xx, connection errors) are retried with increasing backoff up to the
//! configured number of attempts. Failures never escape as errors: the caller
//! always gets a [`FetchResult`], and blank text is reported as
//! [`FetchStatus::Unreadable`].

mod direct;
mod firecrawl;

pub use direct::DirectService;
pub use firecrawl::FirecrawlService;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use url::Url;

use crate::models::{FetchResult, FetchStatus};
use crate::utils::{with_retry, Pacer, RetryConfig, Retryable, TransientError};

/// Failure of a single content request
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Rate limit exceeded")]
    RateLimited(Option<u64>),

    #[error("Not found (status {0})")]
    NotFound(u16),

    #[error("Server error (status {0})")]
    Server(u16),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unreadable content: {0}")]
    Unreadable(String),
}

impl FetchError {
    /// Map a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, retry_after: Option<u64>) -> Self {
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::GONE {
            return FetchError::NotFound(status.as_u16());
        }
        match TransientError::from_status(status, retry_after) {
            Some(TransientError::RateLimit(after)) => FetchError::RateLimited(after),
            Some(TransientError::Timeout) => FetchError::Timeout,
            Some(_) => FetchError::Server(status.as_u16()),
            None => FetchError::Unreadable(format!("status {}", status)),
        }
    }

    /// Map a transport error
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            return FetchError::Timeout;
        }
        match err.status() {
            Some(status) => Self::from_status(status, None),
            None => FetchError::Network(err.to_string()),
        }
    }

    /// Status reported to the pipeline once retries are over
    pub fn status(&self) -> FetchStatus {
        match self {
            FetchError::Timeout | FetchError::Network(_) => FetchStatus::Timeout,
            FetchError::RateLimited(_) => FetchStatus::RateLimited,
            FetchError::NotFound(_) => FetchStatus::NotFound,
            FetchError::Server(_) | FetchError::Unreadable(_) => FetchStatus::Unreadable,
        }
    }
}

impl Retryable for FetchError {
    fn transient(&self) -> Option<TransientError> {
        match self {
            FetchError::Timeout => Some(TransientError::Timeout),
            FetchError::RateLimited(after) => Some(TransientError::RateLimit(*after)),
            FetchError::Server(_) => Some(TransientError::ServerError),
            FetchError::Network(_) => Some(TransientError::Network),
            FetchError::NotFound(_) | FetchError::Unreadable(_) => None,
        }
    }
}

/// Black-box content fetcher: URL in, text out
#[async_trait]
pub trait ContentService: Send + Sync + std::fmt::Debug {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Fetch `url` and return its main text content
    async fn fetch_text(&self, url: &Url) -> Result<String, FetchError>;
}

/// Paced, retrying front end to a [`ContentService`]
#[derive(Debug, Clone)]
pub struct FetchClient {
    service: Arc<dyn ContentService>,
    pacer: Pacer,
    retry: RetryConfig,
    memo: Arc<Mutex<HashMap<String, FetchResult>>>,
}

impl FetchClient {
    pub fn new(service: Arc<dyn ContentService>, pacer: Pacer, retry: RetryConfig) -> Self {
        Self {
            service,
            pacer,
            retry,
            memo: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Fetch the text behind `url`
    pub async fn fetch(&self, url: &Url) -> FetchResult {
        if let Some(hit) = self.memo_get(url) {
            tracing::debug!("Fetch memo hit for {}", url);
            return hit;
        }

        let service = &self.service;
        let pacer = &self.pacer;
        let outcome = with_retry(self.retry, move || async move {
            pacer.wait().await;
            tracing::debug!("{} request for {}", service.name(), url);
            service.fetch_text(url).await
        })
        .await;

        let result = match outcome {
            Ok(text) => {
                let result = FetchResult::ok(text);
                match result.text() {
                    Some(text) => tracing::info!(
                        "Fetched {} chars ({} words) from {}",
                        text.len(),
                        text.split_whitespace().count(),
                        url
                    ),
                    None => tracing::warn!("Empty content from {}", url),
                }
                result
            }
            Err(error) => {
                tracing::warn!("Fetch failed for {}: {}", url, error);
                FetchResult::failed(error.status())
            }
        };

        if matches!(
            result.status,
            FetchStatus::Ok | FetchStatus::NotFound | FetchStatus::Unreadable
        ) {
            self.memo_put(url, &result);
        }

        result
    }

    fn memo_get(&self, url: &Url) -> Option<FetchResult> {
        self.memo
            .lock()
            .ok()
            .and_then(|memo| memo.get(url.as_str()).cloned())
    }

    fn memo_put(&self, url: &Url, result: &FetchResult) {
        if let Ok(mut memo) = self.memo.lock() {
            memo.insert(url.to_string(), result.clone());
        }
    }
}
