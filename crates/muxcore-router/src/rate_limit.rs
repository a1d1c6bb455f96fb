//! Per-server token bucket rate limiting.

use std::sync::RwLock;
use std::time::Instant;

/// A token bucket refilled at a fixed rate, one per `server_id`.
pub struct TokenBucket {
    rate_per_sec: f64,
    burst: f64,
    state: RwLock<BucketState>,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Build a bucket starting full, refilling at `rate_per_sec` tokens per
    /// second up to a capacity of `burst`.
    #[must_use]
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        let burst = f64::from(burst.max(1));
        Self {
            rate_per_sec,
            burst,
            state: RwLock::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Attempt to take one token. Returns `true` if allowed.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.write().expect("rate limiter lock poisoned");
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.rate_per_sec).min(self.burst);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}
