//! HTTP middleware for the relay router.
//!
//! Applied per method on `/`, outermost first:
//! - GET: `require_channel` → `connect_rate_limit`
//! - POST: `require_channel` → `auth_middleware` → `broadcast_rate_limit`

pub mod auth;
pub mod channel;
pub mod client_ip;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthState};
pub use channel::require_channel;
pub use client_ip::{resolve_client_ip, ClientIp};
pub use rate_limit::{broadcast_rate_limit, connect_rate_limit, RateLimiterState};
