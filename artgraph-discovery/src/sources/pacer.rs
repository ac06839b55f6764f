//! Per-source call pacing
//!
//! A GCRA token bucket with burst 1 and a period equal to the configured delay,
//! so consecutive calls through one pacer are at least `delay` apart no matter
//! how many tasks share it.

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::time::Duration;
use tracing::debug;

pub struct Pacer {
    source: &'static str,
    limiter: Option<DefaultDirectRateLimiter>,
}

impl Pacer {
    /// A zero delay disables pacing
    pub fn new(source: &'static str, delay: Duration) -> Self {
        let limiter = Quota::with_period(delay).map(RateLimiter::direct);
        Self { source, limiter }
    }

    /// Wait for the next call slot
    pub async fn ready(&self) {
        if let Some(limiter) = &self.limiter {
            if limiter.check().is_err() {
                debug!(source = self.source, "Pacing: waiting for next call slot");
                limiter.until_ready().await;
            }
        }
    }
}
