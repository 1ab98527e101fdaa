//! Per-source request spacing
//!
//! Every outbound request to a source first passes its `RateLimiter`. The
//! limiter holds the source's timing state behind an async mutex, so two
//! tasks crawling the same source queue up and are spaced as well.

use crate::model::SourceId;
use crate::state::SourceState;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces the minimum interval between requests to one source
#[derive(Debug)]
pub struct RateLimiter {
    source: SourceId,
    state: Mutex<SourceState>,
}

impl RateLimiter {
    pub fn new(source: SourceId, min_interval: Duration) -> Self {
        Self {
            source,
            state: Mutex::new(SourceState::new(min_interval)),
        }
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    /// Waits until a request may be sent, then claims the slot
    ///
    /// The state lock is held across the wait, so callers are let through
    /// one at a time in arrival order.
    pub async fn acquire(&self) {
        let mut state = self.state.lock().await;

        if let Some(wait) = state.time_until_next_request(Instant::now()) {
            tracing::debug!("{}: waiting {:?} before next request", self.source, wait);
            tokio::time::sleep(wait).await;
        }

        state.record_request(Instant::now());
    }

    /// Number of requests let through so far
    pub async fn request_count(&self) -> u64 {
        self.state.lock().await.request_count
    }
}

/// The rate limiters of every source, keyed by source
#[derive(Debug, Default, Clone)]
pub struct RateLimiters {
    limiters: HashMap<SourceId, Arc<RateLimiter>>,
}

impl RateLimiters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a limiter for a source, replacing any previous one
    pub fn insert(&mut self, source: SourceId, min_interval: Duration) -> Arc<RateLimiter> {
        let limiter = Arc::new(RateLimiter::new(source, min_interval));
        self.limiters.insert(source, Arc::clone(&limiter));
        limiter
    }

    pub fn get(&self, source: SourceId) -> Option<Arc<RateLimiter>> {
        self.limiters.get(&source).cloned()
    }

    /// Returns the source's limiter, creating one with `min_interval` if absent
    pub fn get_or_insert(&mut self, source: SourceId, min_interval: Duration) -> Arc<RateLimiter> {
        match self.get(source) {
            Some(limiter) => limiter,
            None => self.insert(source, min_interval),
        }
    }
}
