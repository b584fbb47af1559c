//! Minimum-interval pacing shared by every caller of a service.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Enforces a fixed minimum interval between consecutive requests.
///
/// Clones share the same budget, so one `Pacer` handed to several clients
/// accounts for the whole process.
#[derive(Clone)]
pub struct Pacer {
    limiter: Option<Arc<DirectLimiter>>,
    interval: Duration,
}

impl std::fmt::Debug for Pacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pacer")
            .field("interval", &self.interval)
            .field("paced", &self.limiter.is_some())
            .finish()
    }
}

impl Pacer {
    /// Create a pacer allowing one request per `min_interval`.
    /// A zero interval disables pacing.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(|quota| Arc::new(RateLimiter::direct(quota)));
        Self {
            limiter,
            interval: min_interval,
        }
    }

    /// A pacer that never waits
    pub fn unpaced() -> Self {
        Self {
            limiter: None,
            interval: Duration::ZERO,
        }
    }

    /// Wait until the next request may be issued
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
