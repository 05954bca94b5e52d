//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between the
//! channel core and the outside world. Adapters implement these ports.
//!
//! ## Channel Core Ports
//!
//! - `Sink` - Per-session output capability
//! - `Clock` - Source of time for staleness, TTL and keepalive
//! - `WakeScheduler` - Durable scheduled wake carrying a channel name
//! - `ChannelMetrics` - Per-actor counters
//!
//! ## Edge Ports
//!
//! - `RateLimiter` - Admission and broadcast throttling
//! - `BroadcastAuthenticator` - Bearer token check for publishers

mod broadcast_authenticator;
mod channel_metrics;
mod clock;
mod rate_limiter;
mod sink;
mod wake_scheduler;

pub use broadcast_authenticator::{AuthError, BroadcastAuthenticator};
pub use channel_metrics::ChannelMetrics;
pub use clock::Clock;
pub use rate_limiter::{RateLimitError, RateLimitKey, RateLimitResult, RateLimitScope, RateLimiter};
pub use sink::{Sink, SinkError};
pub use wake_scheduler::{ScheduledWake, SchedulerError, WakeScheduler};
