use std::time::Duration;
use tokio::time::Instant;

/// Minimum spacing between accepted sends.
///
/// Unlike a token bucket this never waits: a call inside the interval is refused
/// and the caller decides what to do.
#[derive(Debug, Clone)]
pub struct Debounce {
    min_interval: Duration,
    last: Option<Instant>,
}

impl Debounce {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    /// Remaining wait if `now` is still inside the interval.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed >= self.min_interval {
            None
        } else {
            Some(self.min_interval - elapsed)
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
