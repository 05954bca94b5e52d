//! Broadcast authentication configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::error::ValidationError;
use super::server::Environment;

/// Shortest token accepted outside development.
pub const MIN_PRODUCTION_TOKEN_LEN: usize = 32;

/// Authentication configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Bearer token publishers must present on broadcast
    pub api_token: SecretString,
}

impl AuthConfig {
    /// Validate authentication configuration
    ///
    /// The token is always required; production additionally requires a
    /// token long enough not to be guessable.
    pub fn validate(&self, environment: &Environment) -> Result<(), ValidationError> {
        let token = self.api_token.expose_secret();
        if token.trim().is_empty() {
            return Err(ValidationError::MissingRequired("API_TOKEN"));
        }
        if *environment == Environment::Production && token.len() < MIN_PRODUCTION_TOKEN_LEN {
            return Err(ValidationError::ApiTokenTooShort(MIN_PRODUCTION_TOKEN_LEN));
        }
        Ok(())
    }
}
