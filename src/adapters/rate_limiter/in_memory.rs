//! In-memory token bucket rate limiter.
//!
//! Each key owns a bucket holding up to `burst` tokens. Tokens refill
//! continuously at `per_minute / 60` per second and every allowed request
//! consumes one. Arithmetic is integral, see [`BucketLimits`]. State lives in process memory, so limits are per instance.
//!
//! A full bucket carries no information, so at most once per
//! [`SWEEP_INTERVAL`] buckets that have refilled to capacity are dropped.
//! The number of tracked keys is bounded by recent traffic, not by every
//! client address ever seen.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::foundation::Timestamp;
use crate::ports::{Clock, RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope, RateLimiter};

use super::config::{BucketLimits, RateLimitConfig, UNITS_PER_TOKEN};

/// Seconds a denied client is told to wait.
pub const RETRY_AFTER_SECS: u32 = 60;

/// Minimum gap between two sweeps of refilled buckets.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// State for a single bucket.
#[derive(Debug, Clone)]
struct Bucket {
    units: u64,
    last_refill: Timestamp,
}

impl Bucket {
    fn full(limits: &BucketLimits, now: Timestamp) -> Self {
        Self {
            units: limits.capacity_units(),
            last_refill: now,
        }
    }

    fn refill(&mut self, limits: &BucketLimits, now: Timestamp) {
        let added = now
            .millis_since(&self.last_refill)
            .saturating_mul(u64::from(limits.per_minute));
        self.units = self.units.saturating_add(added).min(limits.capacity_units());
        self.last_refill = now;
    }

    fn whole_tokens(&self) -> u32 {
        (self.units / UNITS_PER_TOKEN) as u32
    }

    /// Whether the bucket would be at capacity if refilled at `now`.
    fn is_full_at(&self, limits: &BucketLimits, now: Timestamp) -> bool {
        let mut refilled = self.clone();
        refilled.refill(limits, now);
        refilled.units >= limits.capacity_units()
    }
}

#[derive(Debug)]
struct Buckets {
    by_key: HashMap<RateLimitKey, Bucket>,
    last_sweep: Timestamp,
}

pub struct InMemoryRateLimiter {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    buckets: Arc<RwLock<Buckets>>,
}

impl InMemoryRateLimiter {
    pub fn new(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            config,
            clock,
            buckets: Arc::new(RwLock::new(Buckets {
                by_key: HashMap::new(),
                last_sweep: now,
            })),
        }
    }

    fn limits_for(&self, scope: RateLimitScope) -> &BucketLimits {
        match scope {
            RateLimitScope::Connect => &self.config.connect,
            RateLimitScope::Broadcast => &self.config.broadcast,
        }
    }

    /// Number of keys currently tracked.
    pub async fn tracked_keys(&self) -> usize {
        self.buckets.read().await.by_key.len()
    }

    /// Drops refilled buckets if a sweep is due. Returns how many were
    /// dropped, or `None` when the sweep was skipped.
    fn sweep_if_due(&self, buckets: &mut Buckets, now: Timestamp) -> Option<usize> {
        if now.millis_since(&buckets.last_sweep) < SWEEP_INTERVAL.as_millis() as u64 {
            return None;
        }
        buckets.last_sweep = now;

        let before = buckets.by_key.len();
        buckets
            .by_key
            .retain(|key, bucket| !bucket.is_full_at(self.limits_for(key.scope), now));
        let removed = before - buckets.by_key.len();
        if removed > 0 {
            tracing::debug!(removed, remaining = buckets.by_key.len(), "idle rate limit buckets dropped");
        }
        Some(removed)
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError> {
        let limits = *self.limits_for(key.scope);
        let now = self.clock.now();

        let mut buckets = self.buckets.write().await;
        self.sweep_if_due(&mut buckets, now);
        let bucket = buckets
            .by_key
            .entry(key)
            .or_insert_with(|| Bucket::full(&limits, now));
        bucket.refill(&limits, now);

        if bucket.units < UNITS_PER_TOKEN {
            return Ok(RateLimitResult::Denied {
                retry_after_secs: RETRY_AFTER_SECS,
            });
        }

        bucket.units -= UNITS_PER_TOKEN;
        Ok(RateLimitResult::Allowed {
            remaining: bucket.whole_tokens(),
        })
    }
}
