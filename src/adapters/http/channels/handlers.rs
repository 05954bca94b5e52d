//! HTTP handlers for channel endpoints.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Query, State},
    http::{
        header::{CACHE_CONTROL, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT},
        HeaderMap, HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
    Extension, Json,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::middleware::ClientIp;
use crate::adapters::sse::{session_channel, SessionStream};
use crate::application::{BroadcastRequest, ChannelDirectory};
use crate::domain::channel::{ChannelError, SessionMetadata};
use crate::domain::foundation::{ChannelName, MessageId};
use crate::ports::{BroadcastAuthenticator, RateLimiter};

use super::dto::{BroadcastResponse, ChannelQuery, HealthResponse, MetricsResponse};

/// Header carrying the per-request trace id.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

static LAST_EVENT_ID: HeaderName = HeaderName::from_static("last-event-id");
static X_ACCEL_BUFFERING: HeaderName = HeaderName::from_static("x-accel-buffering");

// ════════════════════════════════════════════════════════════════════════════
// Handler state
// ════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct RelayState {
    pub directory: Arc<ChannelDirectory>,
    pub authenticator: Arc<dyn BroadcastAuthenticator>,
    pub rate_limiter: Arc<dyn RateLimiter>,
}

impl RelayState {
    pub fn new(
        directory: Arc<ChannelDirectory>,
        authenticator: Arc<dyn BroadcastAuthenticator>,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            directory,
            authenticator,
            rate_limiter,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// HTTP handlers
// ════════════════════════════════════════════════════════════════════════════

/// GET /?channel=<name>[&lastEventId=<id>] - Open an event stream
pub async fn open_connection(
    State(state): State<RelayState>,
    Extension(channel): Extension<ChannelName>,
    ClientIp(client_ip): ClientIp,
    Query(query): Query<ChannelQuery>,
    headers: HeaderMap,
) -> Response {
    let metadata = SessionMetadata {
        client_ip,
        user_agent: header_str(&headers, &USER_AGENT)
            .unwrap_or("unknown")
            .to_string(),
        request_id: request_id(&headers),
    };
    let last_event_id = query
        .last_event_id
        .filter(|id| !id.is_empty())
        .or_else(|| header_str(&headers, &LAST_EVENT_ID).map(str::to_string))
        .map(MessageId::from_client);

    let (sink, stream) = session_channel(state.directory.limits().sink_buffer);
    let disconnect = CancellationToken::new();
    let stream = stream.cancel_on_drop(disconnect.clone());

    let handle = match state.directory.get_or_spawn(&channel).await {
        Ok(handle) => handle,
        Err(err) => return ApiError::from(err).into_response(),
    };
    match handle
        .open_connection(metadata, last_event_id, Arc::new(sink), disconnect)
        .await
    {
        Ok(_) => event_stream_response(stream),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// POST /?channel=<name> - Broadcast a JSON object to the channel
///
/// Bodies whose declared length exceeds the limit are refused before any
/// byte is read.
pub async fn broadcast(
    State(state): State<RelayState>,
    Extension(channel): Extension<ChannelName>,
    headers: HeaderMap,
    body: Body,
) -> Response {
    let max = state.directory.limits().max_body_bytes;
    let declared_length = header_str(&headers, &CONTENT_LENGTH)
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    if declared_length > max {
        return ApiError::from(ChannelError::TooLarge {
            size: declared_length,
            max,
        })
        .into_response();
    }

    let limit = usize::try_from(max).unwrap_or(usize::MAX).saturating_add(1);
    let body = match to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return ApiError::from(ChannelError::TooLarge {
                size: max.saturating_add(1),
                max,
            })
            .into_response()
        }
    };

    let request = BroadcastRequest {
        body: Some(body),
        declared_length,
        request_id: request_id(&headers),
    };
    let handle = match state.directory.get_or_spawn(&channel).await {
        Ok(handle) => handle,
        Err(err) => return ApiError::from(err).into_response(),
    };
    match handle.broadcast(request).await {
        Ok(outcome) => (StatusCode::OK, Json(BroadcastResponse::from(outcome))).into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}

/// GET /health - Liveness and channel count
pub async fn health(State(state): State<RelayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        channels: state.directory.channel_count().await,
    })
}

/// GET /metrics - Counter snapshot
pub async fn metrics(State(state): State<RelayState>) -> Json<MetricsResponse> {
    Json(MetricsResponse::from_channels(
        state.directory.metrics_snapshot().await,
    ))
}

/// OPTIONS / - Bare preflight; CORS headers are added by the CORS layer.
pub async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

// ════════════════════════════════════════════════════════════════════════════
// Helpers
// ════════════════════════════════════════════════════════════════════════════

fn event_stream_response(stream: SessionStream) -> Response {
    let mut response = Body::from_stream(stream.map(Ok::<_, Infallible>)).into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
    headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache, no-transform"));
    headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(X_ACCEL_BUFFERING.clone(), HeaderValue::from_static("no"));
    response
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn request_id(headers: &HeaderMap) -> String {
    header_str(headers, &X_REQUEST_ID)
        .unwrap_or_default()
        .to_string()
}
