//! Bearer token check for broadcast requests.
//!
//! The middleware uses the `BroadcastAuthenticator` port, so the token
//! source (static secret, remote service, test double) can change without
//! touching the router.
//!
//! ```text
//! Request → auth_middleware → 401 (no bearer) / 403 (wrong bearer) / next
//! ```

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::adapters::http::error::ApiError;
use crate::ports::BroadcastAuthenticator;

/// Auth middleware state - wraps the authenticator.
pub type AuthState = Arc<dyn BroadcastAuthenticator>;

/// Rejects requests without a valid `Authorization: Bearer <token>` header.
pub async fn auth_middleware(
    State(authenticator): State<AuthState>,
    request: Request,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim);

    match authenticator.authenticate(token).await {
        Ok(()) => next.run(request).await,
        Err(err) => {
            tracing::warn!(error = %err, "broadcast authentication failed");
            ApiError::from(err).into_response()
        }
    }
}
