//! HTTP adapter - the router in front of the channel actors.
//!
//! Validates channel names, authenticates publishers, applies rate limits
//! and hands requests to the [`ChannelDirectory`].
//!
//! [`ChannelDirectory`]: crate::application::ChannelDirectory

pub mod channels;
pub mod error;
pub mod middleware;

use std::time::Duration;

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use channels::{channel_routes, RelayState, X_REQUEST_ID};
pub use error::ApiError;

/// Router-wide settings taken from configuration.
#[derive(Debug, Clone)]
pub struct HttpOptions {
    /// Upper bound on a broadcast request.
    pub request_timeout: Duration,
    /// Allowed CORS origins; empty allows any origin.
    pub cors_origins: Vec<String>,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            cors_origins: Vec::new(),
        }
    }
}

/// Builds the complete relay router with tracing, request ids and CORS.
pub fn relay_router(state: RelayState, options: &HttpOptions) -> Router {
    let trace_layer = TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
        let request_id = request
            .headers()
            .get(&X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        tracing::info_span!(
            "http.request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id
        )
    });

    channel_routes(state, options.request_timeout).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(X_REQUEST_ID.clone(), MakeRequestUuid))
            .layer(trace_layer)
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID.clone()))
            .layer(cors_layer(&options.cors_origins)),
    )
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        AllowOrigin::list(origins.iter().filter_map(|o| o.parse::<HeaderValue>().ok()))
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("last-event-id"),
        ])
        .max_age(Duration::from_secs(86_400))
}
