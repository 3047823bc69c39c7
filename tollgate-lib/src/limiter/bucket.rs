use std::time::Instant;

/// Outcome of a single consume attempt against a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeResult {
    pub allowed: bool,
    /// Whole tokens left after the attempt (floored)
    pub remaining: u32,
    /// Bucket capacity
    pub limit: u32,
    /// Advisory reset hint in seconds
    pub reset_seconds: u32,
}

/// Continuous-refill token bucket
///
/// Starts full. Tokens are topped up lazily on every consume attempt from the
/// time elapsed since the previous refill, capped at capacity.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_second: f64,
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    pub fn new(refill_per_second: u32, capacity: u32) -> Self {
        Self::new_at(refill_per_second, capacity, Instant::now())
    }

    pub fn new_at(refill_per_second: u32, capacity: u32, now: Instant) -> Self {
        let capacity = f64::from(capacity);
        Self {
            capacity,
            refill_per_second: f64::from(refill_per_second),
            tokens: capacity,
            last_refill: now,
        }
    }

    /// Refill from wall-clock time, then try to take `weight` tokens
    pub fn try_consume(&mut self, weight: u32) -> bool {
        self.try_consume_at(weight, Instant::now())
    }

    /// Same as [`TokenBucket::try_consume`] with an explicit clock reading
    ///
    /// A `now` earlier than the last refill counts as zero elapsed time.
    pub fn try_consume_at(&mut self, weight: u32, now: Instant) -> bool {
        self.refill(now);
        let weight = f64::from(weight);
        if self.tokens >= weight {
            self.tokens -= weight;
            true
        } else {
            false
        }
    }

    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        if elapsed > 0.0 {
            self.tokens = self
                .capacity
                .min(self.tokens + elapsed * self.refill_per_second);
            self.last_refill = now;
        }
    }

    /// Whole tokens currently available (floored, never negative)
    pub fn available(&self) -> u32 {
        // tokens is clamped to [0, capacity] and capacity came from a u32
        self.tokens.max(0.0).floor() as u32
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}
