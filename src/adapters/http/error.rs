//! Mapping of relay errors onto HTTP responses.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::channel::ChannelError;
use crate::ports::AuthError;

use super::channels::dto::ErrorResponse;

/// Errors surfaced by the relay endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid channel name")]
    InvalidChannel,

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("{message}")]
    RateLimited {
        message: &'static str,
        retry_after_secs: u32,
    },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidChannel => StatusCode::BAD_REQUEST,
            ApiError::Channel(err) => match err {
                ChannelError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                ChannelError::MissingBody
                | ChannelError::InvalidJson(_)
                | ChannelError::NotAnObject => StatusCode::BAD_REQUEST,
                ChannelError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                ChannelError::DuplicateSession(_) => StatusCode::CONFLICT,
                ChannelError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            ApiError::Auth(AuthError::MissingCredentials) => StatusCode::UNAUTHORIZED,
            ApiError::Auth(AuthError::InvalidToken) => StatusCode::FORBIDDEN,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidChannel => "INVALID_CHANNEL",
            ApiError::Channel(err) => match err {
                ChannelError::CapacityExceeded { .. } => "TOO_MANY_CONNECTIONS",
                ChannelError::MissingBody => "MISSING_BODY",
                ChannelError::TooLarge { .. } => "MESSAGE_TOO_LARGE",
                ChannelError::InvalidJson(_) => "INVALID_JSON",
                ChannelError::NotAnObject => "INVALID_FORMAT",
                ChannelError::DuplicateSession(_) => "DUPLICATE_SESSION",
                ChannelError::Unavailable => "CHANNEL_UNAVAILABLE",
            },
            ApiError::Auth(AuthError::MissingCredentials) => "UNAUTHORIZED",
            ApiError::Auth(AuthError::InvalidToken) => "INVALID_TOKEN",
            ApiError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ErrorResponse::new(self.code(), self.to_string());
        let mut response = (status, Json(body)).into_response();

        if let ApiError::RateLimited {
            retry_after_secs, ..
        } = self
        {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}
