//! Channel name validation.
//!
//! Runs before authentication and rate limiting so every request to `/`
//! names a valid channel by the time anything else looks at it.

use axum::{
    extract::{Query, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::adapters::http::channels::dto::ChannelQuery;
use crate::adapters::http::error::ApiError;
use crate::domain::foundation::ChannelName;

/// Parses `?channel=` and stores the validated [`ChannelName`] in the
/// request extensions; responds `400 Invalid channel name` otherwise.
pub async fn require_channel(mut request: Request, next: Next) -> Response {
    let raw = Query::<ChannelQuery>::try_from_uri(request.uri())
        .ok()
        .and_then(|Query(query)| query.channel);

    let channel = match raw.as_deref().map(ChannelName::new) {
        Some(Ok(channel)) => channel,
        Some(Err(err)) => {
            tracing::debug!(error = %err, "rejected channel name");
            return ApiError::InvalidChannel.into_response();
        }
        None => return ApiError::InvalidChannel.into_response(),
    };

    request.extensions_mut().insert(channel);
    next.run(request).await
}
