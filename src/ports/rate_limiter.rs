//! Rate limiting port for protecting channel admission and broadcasts.
//!
//! Keys are scoped so connection attempts (per client IP) and broadcasts
//! (per channel) draw from independent budgets.

use async_trait::async_trait;
use std::fmt;

/// Port for rate limiting operations.
///
/// Implementations should be thread-safe and support concurrent access.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Check if request is allowed, consuming a token if so.
    async fn check(&self, key: RateLimitKey) -> Result<RateLimitResult, RateLimitError>;
}

/// The scope at which rate limiting is applied.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum RateLimitScope {
    /// Connection attempts from one client IP.
    Connect,
    /// Broadcasts to one channel.
    Broadcast,
}

impl RateLimitScope {
    /// Returns the string representation of the scope.
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Connect => "connect",
            RateLimitScope::Broadcast => "broadcast",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key identifying what to rate limit.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct RateLimitKey {
    pub scope: RateLimitScope,
    /// Identifier within the scope (client IP or channel name).
    pub identifier: String,
}

impl RateLimitKey {
    /// Creates a connection-attempt key for a client IP.
    pub fn connect(client_ip: &str) -> Self {
        Self {
            scope: RateLimitScope::Connect,
            identifier: client_ip.to_string(),
        }
    }

    /// Creates a broadcast key for a channel.
    pub fn broadcast(channel: &str) -> Self {
        Self {
            scope: RateLimitScope::Broadcast,
            identifier: channel.to_string(),
        }
    }
}

impl fmt::Display for RateLimitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ratelimit:{}:{}", self.scope, self.identifier)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitResult {
    /// Request is allowed; `remaining` whole tokens are left.
    Allowed { remaining: u32 },
    /// Request is denied.
    Denied { retry_after_secs: u32 },
}

impl RateLimitResult {
    /// Returns true if the request was allowed.
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitResult::Allowed { .. })
    }

    /// Returns true if the request was denied.
    pub fn is_denied(&self) -> bool {
        matches!(self, RateLimitResult::Denied { .. })
    }
}

/// Errors from rate limiter backends.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limiter unavailable: {0}")]
    Unavailable(String),
}
