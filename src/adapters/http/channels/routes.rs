//! HTTP routes for the relay.

use std::time::Duration;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use crate::adapters::http::middleware::{
    auth_middleware, broadcast_rate_limit, connect_rate_limit, require_channel,
};

use super::handlers::{broadcast, health, metrics, open_connection, preflight, RelayState};

/// Creates the relay router.
///
/// `/` carries both event-stream subscriptions (GET) and broadcasts (POST);
/// each method gets its own middleware stack. `request_timeout` bounds
/// broadcasts only, since subscriptions are meant to stay open.
pub fn channel_routes(state: RelayState, request_timeout: Duration) -> Router {
    let subscribe = get(open_connection).layer(
        ServiceBuilder::new()
            .layer(from_fn(require_channel))
            .layer(from_fn_with_state(state.rate_limiter.clone(), connect_rate_limit)),
    );
    let publish = post(broadcast).layer(
        ServiceBuilder::new()
            .layer(TimeoutLayer::new(request_timeout))
            .layer(from_fn(require_channel))
            .layer(from_fn_with_state(state.authenticator.clone(), auth_middleware))
            .layer(from_fn_with_state(state.rate_limiter.clone(), broadcast_rate_limit)),
    );

    Router::new()
        .route("/", subscribe.merge(publish).options(preflight))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
}
