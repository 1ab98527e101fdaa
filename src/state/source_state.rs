use std::time::Duration;
use tokio::time::Instant;

/// Tracks request timing for one source
///
/// Timestamps come from `tokio::time`, so a paused runtime clock drives them
/// in tests.
#[derive(Debug, Clone)]
pub struct SourceState {
    /// When the previous request to this source was let through
    pub last_request_at: Option<Instant>,

    /// Minimum spacing between two requests to this source
    pub min_interval: Duration,

    /// Number of requests let through so far
    pub request_count: u64,
}

impl SourceState {
    /// Creates a SourceState with no request history
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_request_at: None,
            min_interval,
            request_count: 0,
        }
    }

    /// Records that a request was made
    pub fn record_request(&mut self, now: Instant) {
        self.request_count += 1;
        self.last_request_at = Some(now);
    }

    /// Calculates the time until the next request can be made
    ///
    /// Returns None if a request can be made now, or the duration to wait otherwise.
    pub fn time_until_next_request(&self, now: Instant) -> Option<Duration> {
        let last = self.last_request_at?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.min_interval {
            Some(self.min_interval - elapsed)
        } else {
            None
        }
    }
}
