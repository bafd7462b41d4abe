//! Fixed-window per-key rate limiting.
//!
//! One counter per key per minute. The counter TTL must outlive the window to
//! cover clock skew at minute boundaries, and must stay bounded so stale
//! counters evaporate on their own.

use anyhow::{ensure, Result};

pub const DEFAULT_REQUESTS_PER_MINUTE: u32 = 100;
pub const DEFAULT_COUNTER_TTL_SECONDS: u64 = 120;

const WINDOW_SECONDS: f64 = 60.0;
const MIN_TTL_EXCLUSIVE: u64 = 60;
const MAX_TTL_INCLUSIVE: u64 = 300;

/// Global rate-limit settings, frozen at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub requests_per_minute: u32,
    pub counter_ttl_seconds: u64,
}

impl RateLimit {
    /// Build validated settings.
    ///
    /// # Errors
    /// Returns an error unless the TTL is strictly above 60 s and at most
    /// 300 s, or when the threshold is zero.
    pub fn new(requests_per_minute: u32, counter_ttl_seconds: u64) -> Result<Self> {
        ensure!(requests_per_minute > 0, "rate limit threshold must be positive");
        ensure!(
            counter_ttl_seconds > MIN_TTL_EXCLUSIVE,
            "rate counter TTL must be strictly greater than {MIN_TTL_EXCLUSIVE}s"
        );
        ensure!(
            counter_ttl_seconds <= MAX_TTL_INCLUSIVE,
            "rate counter TTL must be at most {MAX_TTL_INCLUSIVE}s"
        );
        Ok(Self {
            requests_per_minute,
            counter_ttl_seconds,
        })
    }

    /// Integer minute window for a given wall-clock time.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn window(now_seconds: f64) -> i64 {
        (now_seconds / WINDOW_SECONDS).floor() as i64
    }

    /// A caller whose post-increment count exceeds the threshold is denied.
    #[must_use]
    pub fn exceeded(self, count_after_increment: i64) -> bool {
        count_after_increment > i64::from(self.requests_per_minute)
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            counter_ttl_seconds: DEFAULT_COUNTER_TTL_SECONDS,
        }
    }
}
