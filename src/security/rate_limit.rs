//! Per-connection message rate limiting.

use std::time::Instant;

use crate::config::RateLimitConfig;

/// A simple token bucket rate limiter.
#[derive(Debug)]
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Inbound message limiter owned by a single session.
///
/// A disabled limiter admits everything.
#[derive(Debug)]
pub struct MessageRateLimiter {
    bucket: Option<TokenBucket>,
    rate: f64,
    burst: f64,
}

impl MessageRateLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        let burst = config.burst_size as f64;
        Self {
            bucket: config.enabled.then(|| TokenBucket::new(burst)),
            rate: config.messages_per_second as f64,
            burst,
        }
    }

    /// Take one token; `false` means the message should be refused.
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    fn check_at(&mut self, now: Instant) -> bool {
        match self.bucket.as_mut() {
            Some(bucket) => bucket.try_acquire(self.burst, self.rate, now),
            None => true,
        }
    }
}
