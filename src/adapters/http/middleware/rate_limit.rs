//! Rate limiting middleware for axum.
//!
//! Two scopes are enforced with the `RateLimiter` port:
//! - connection attempts, keyed by client IP
//! - broadcasts, keyed by channel name
//!
//! Denied requests get `429` with `Retry-After`. If the limiter backend is
//! unavailable the request is let through.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::adapters::http::error::ApiError;
use crate::domain::foundation::ChannelName;
use crate::ports::{RateLimitKey, RateLimitResult, RateLimiter};

use super::client_ip::ClientIp;

/// Rate limiter middleware state.
pub type RateLimiterState = Arc<dyn RateLimiter>;

/// Limits new event-stream connections per client IP.
pub async fn connect_rate_limit(
    State(limiter): State<RateLimiterState>,
    ClientIp(client_ip): ClientIp,
    request: Request,
    next: Next,
) -> Response {
    let key = RateLimitKey::connect(&client_ip);
    if let Some(denied) = check(&limiter, key, "Too many connection attempts").await {
        tracing::warn!(client_ip = %client_ip, "connection rate limit exceeded");
        return denied;
    }
    next.run(request).await
}

/// Limits broadcasts per channel. Runs after channel validation, which
/// leaves the [`ChannelName`] in the request extensions.
pub async fn broadcast_rate_limit(
    State(limiter): State<RateLimiterState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(channel) = request.extensions().get::<ChannelName>().cloned() else {
        return ApiError::InvalidChannel.into_response();
    };

    let key = RateLimitKey::broadcast(channel.as_str());
    if let Some(denied) = check(&limiter, key, "Rate limit exceeded for broadcasts").await {
        tracing::warn!(channel = %channel, "broadcast rate limit exceeded");
        return denied;
    }
    next.run(request).await
}

async fn check(
    limiter: &RateLimiterState,
    key: RateLimitKey,
    message: &'static str,
) -> Option<Response> {
    match limiter.check(key).await {
        Ok(RateLimitResult::Allowed { .. }) => None,
        Ok(RateLimitResult::Denied { retry_after_secs }) => Some(
            ApiError::RateLimited {
                message,
                retry_after_secs,
            }
            .into_response(),
        ),
        Err(e) => {
            tracing::warn!("Rate limiter unavailable: {}", e);
            None
        }
    }
}
