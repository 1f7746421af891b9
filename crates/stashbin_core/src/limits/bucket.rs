//! Lazily refilled token bucket.

use std::time::Instant;

/// Token bucket whose refill is computed from elapsed time at each call.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// A full bucket as of `now`.
    pub fn full(capacity: u32, now: Instant) -> Self {
        Self {
            tokens: f64::from(capacity),
            last_refill: now,
        }
    }

    /// Tokens available at `now`, capped at `capacity`.
    pub fn available(&self, capacity: u32, refill_per_sec: f64, now: Instant) -> f64 {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        (self.tokens + elapsed * refill_per_sec).min(f64::from(capacity))
    }

    /// Deduct `cost` tokens if available.
    ///
    /// A denied attempt leaves the bucket untouched, so it has no effect on
    /// later decisions beyond the passage of time.
    ///
    /// # Returns
    /// `true` when the tokens were taken.
    pub fn try_consume(&mut self, capacity: u32, cost: u32, refill_per_sec: f64, now: Instant) -> bool {
        let available = self.available(capacity, refill_per_sec, now);
        if available < f64::from(cost) {
            return false;
        }
        self.tokens = available - f64::from(cost);
        self.last_refill = now.max(self.last_refill);
        true
    }
}
