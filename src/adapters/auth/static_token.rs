//! Static bearer token authenticator.
//!
//! Publishers share one API token configured at startup. The comparison is
//! constant-time so response timing does not leak how much of a guess was
//! right.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::ports::{AuthError, BroadcastAuthenticator};

pub struct StaticTokenAuthenticator {
    token: SecretString,
}

impl StaticTokenAuthenticator {
    pub fn new(token: SecretString) -> Self {
        Self { token }
    }
}

impl std::fmt::Debug for StaticTokenAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticTokenAuthenticator")
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[async_trait]
impl BroadcastAuthenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, bearer_token: Option<&str>) -> Result<(), AuthError> {
        let provided = match bearer_token {
            Some(token) if !token.is_empty() => token,
            _ => return Err(AuthError::MissingCredentials),
        };

        let expected = self.token.expose_secret().as_bytes();
        if expected.ct_eq(provided.as_bytes()).unwrap_u8() != 1 {
            return Err(AuthError::InvalidToken);
        }
        Ok(())
    }
}
