//! Rate limit configuration types.

use serde::{Deserialize, Serialize};

/// Buckets count in units of 1/60000 token, so refilling `per_minute` tokens
/// adds exactly `per_minute` units per elapsed millisecond.
pub(crate) const UNITS_PER_TOKEN: u64 = 60_000;

/// Token bucket parameters for one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketLimits {
    /// Tokens available to a fresh key; the bucket never holds more.
    pub burst: u32,
    /// Tokens added per minute, refilled continuously.
    pub per_minute: u32,
}

impl BucketLimits {
    pub fn new(burst: u32, per_minute: u32) -> Self {
        Self { burst, per_minute }
    }

    /// Bucket capacity in [`UNITS_PER_TOKEN`] units.
    pub(crate) fn capacity_units(&self) -> u64 {
        u64::from(self.burst) * UNITS_PER_TOKEN
    }
}

/// Complete rate limit configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Connection attempts per client IP.
    pub connect: BucketLimits,
    /// Broadcasts per channel.
    pub broadcast: BucketLimits,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            connect: BucketLimits::new(20, 60),
            broadcast: BucketLimits::new(50, 600),
        }
    }
}
