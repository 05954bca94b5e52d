//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the channel core to the outside world:
//! - `sse` - channel-backed session sinks and the response byte stream
//! - `clock` - system and manual clocks
//! - `scheduler` - tokio timer wakes and a recording double
//! - `metrics` - in-memory per-channel counters
//! - `rate_limiter` - in-memory token buckets
//! - `auth` - static bearer token check
//! - `http` - axum router, handlers and middleware

pub mod auth;
pub mod clock;
pub mod http;
pub mod metrics;
pub mod rate_limiter;
pub mod scheduler;
pub mod sse;

pub use auth::StaticTokenAuthenticator;
pub use clock::{ManualClock, SystemClock};
pub use self::http::{relay_router, HttpOptions, RelayState};
pub use metrics::InMemoryChannelMetrics;
pub use rate_limiter::{BucketLimits, InMemoryRateLimiter, RateLimitConfig};
pub use scheduler::{RecordingWakeScheduler, TokioWakeScheduler, WakeReceiver};
pub use sse::{session_channel, ChannelSink, SessionStream};
