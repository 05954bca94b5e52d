//! Rate limit configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::adapters::rate_limiter::{BucketLimits, RateLimitConfig as BucketConfig};

/// Token bucket sizes for connection and broadcast limiting
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitSettings {
    /// Connection attempts a client IP may burst
    pub connect_burst: u32,
    /// Connection attempts per IP refilled each minute
    pub connect_per_minute: u32,
    /// Broadcasts a channel may burst
    pub broadcast_burst: u32,
    /// Broadcasts per channel refilled each minute
    pub broadcast_per_minute: u32,
}

impl RateLimitSettings {
    pub fn to_bucket_config(&self) -> BucketConfig {
        BucketConfig {
            connect: BucketLimits::new(self.connect_burst, self.connect_per_minute),
            broadcast: BucketLimits::new(self.broadcast_burst, self.broadcast_per_minute),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.connect_burst == 0 {
            return Err(ValidationError::ZeroRateLimit("CONNECT_BURST"));
        }
        if self.broadcast_burst == 0 {
            return Err(ValidationError::ZeroRateLimit("BROADCAST_BURST"));
        }
        Ok(())
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        let defaults = BucketConfig::default();
        Self {
            connect_burst: defaults.connect.burst,
            connect_per_minute: defaults.connect.per_minute,
            broadcast_burst: defaults.broadcast.burst,
            broadcast_per_minute: defaults.broadcast.per_minute,
        }
    }
}
