//! Token bucket throughput limiter.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

/// Bytes in one megabyte, as used by the `rate` setting.
pub const BYTES_PER_MEGABYTE: f64 = 1024.0 * 1024.0;

/// Smallest capacity and refill rate a bucket accepts.
const MIN_TOKENS: f64 = 1.0;

struct BucketState {
    tokens: f64,
    last_update: Instant,
}

/// A token bucket: `capacity` tokens of burst, refilled continuously at
/// `refill_rate` tokens per second. One token is one byte.
pub struct TokenBucket {
    capacity: f64,
    refill_rate: f64,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    /// Create a full bucket.
    ///
    /// `capacity` and `refill_rate` below one token, or not finite, are raised
    /// to one token so that `acquire` always makes progress.
    pub fn new(capacity: f64, refill_rate: f64) -> Self {
        let capacity = at_least_one_token("capacity", capacity);
        let refill_rate = at_least_one_token("refill_rate", refill_rate);
        Self {
            capacity,
            refill_rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_update: Instant::now(),
            }),
        }
    }

    /// A bucket refilling at `rate` megabytes per second with one second of burst.
    pub fn from_megabytes_per_sec(rate: f64) -> Self {
        let bytes_per_sec = rate * BYTES_PER_MEGABYTE;
        Self::new(bytes_per_sec, bytes_per_sec)
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Tokens available right now.
    pub fn available(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);
        state.tokens
    }

    /// Take `n` tokens if they are all available now.
    pub fn try_acquire(&self, n: usize) -> bool {
        self.try_take(n as f64).is_ok()
    }

    /// Wait until `n` tokens have been taken.
    ///
    /// Requests larger than the burst capacity are taken in capacity-sized
    /// pieces, so they are paced rather than refused.
    pub async fn acquire(&self, n: usize) {
        let mut remaining = n as f64;
        while remaining > 0.0 {
            let chunk = remaining.min(self.capacity);
            while let Err(wait) = self.try_take(chunk) {
                tokio::time::sleep(wait).await;
            }
            remaining -= chunk;
        }
    }

    /// Debit `amount` tokens, or report how long until they will be available.
    fn try_take(&self, amount: f64) -> Result<(), Duration> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state);

        if state.tokens >= amount {
            state.tokens -= amount;
            Ok(())
        } else {
            let missing = amount - state.tokens;
            Err(Duration::from_secs_f64((missing / self.refill_rate).max(0.001)))
        }
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_update).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_rate).min(self.capacity);
        state.last_update = now;
    }
}

fn at_least_one_token(name: &'static str, value: f64) -> f64 {
    if value.is_finite() && value >= MIN_TOKENS {
        return value;
    }
    tracing::warn!(setting = name, value, "Token bucket setting out of range, using one token");
    MIN_TOKENS
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("capacity", &self.capacity)
            .field("refill_rate", &self.refill_rate)
            .finish()
    }
}
