//! Rate limiter adapters.
//!
//! Implementations of the RateLimiter port.
//!
//! ## Available Adapters
//!
//! - `InMemoryRateLimiter` - token bucket per key, single instance

mod config;
mod in_memory;

pub use config::{BucketLimits, RateLimitConfig};
pub use in_memory::{InMemoryRateLimiter, RETRY_AFTER_SECS};
