//! BroadcastAuthenticator port - who may publish to channels.

use async_trait::async_trait;

/// Reasons a broadcast request is refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// No bearer credentials were presented.
    #[error("Unauthorized")]
    MissingCredentials,

    /// Credentials were presented but are not valid.
    #[error("Invalid token")]
    InvalidToken,
}

#[async_trait]
pub trait BroadcastAuthenticator: Send + Sync {
    /// Checks the bearer token from the `Authorization` header, if any.
    async fn authenticate(&self, bearer_token: Option<&str>) -> Result<(), AuthError>;
}
