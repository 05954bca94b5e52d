//! Listener, logging and HTTP edge settings

use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use super::error::ValidationError;
use crate::adapters::http::HttpOptions;

/// Longest broadcast request timeout accepted.
const MAX_BROADCAST_TIMEOUT_SECS: u64 = 300;

/// Settings for the HTTP listener in front of the channel actors
///
/// Event-stream subscriptions are unbounded in time; only broadcast POSTs
/// are subject to `request_timeout_secs`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// IP address to bind (not a hostname)
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// Filter directive used when `RUST_LOG` is unset
    pub log_level: String,
    /// Upper bound on a broadcast request, in seconds
    pub request_timeout_secs: u64,
    /// Comma-separated browser origins; unset allows any origin outside
    /// production
    pub cors_origins: Option<String>,
}

/// Deployment environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ValidationError> {
        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|_| ValidationError::InvalidSocketAddr(format!("{}:{}", self.host, self.port)))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Broadcast timeout; subscriptions have none.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cors_origins_list(&self) -> Vec<String> {
        self.cors_origins
            .iter()
            .flat_map(|raw| raw.split(','))
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Router settings derived from this section.
    pub fn http_options(&self) -> HttpOptions {
        HttpOptions {
            request_timeout: self.request_timeout(),
            cors_origins: self.cors_origins_list(),
        }
    }

    /// Checks the listener address, the broadcast timeout and the CORS
    /// origins. Production must name its origins explicitly, since an empty
    /// list opens broadcasts to any page holding the token.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        self.socket_addr()?;

        if !(1..=MAX_BROADCAST_TIMEOUT_SECS).contains(&self.request_timeout_secs) {
            return Err(ValidationError::InvalidTimeout);
        }

        let origins = self.cors_origins_list();
        if let Some(bad) = origins
            .iter()
            .find(|o| !(o.starts_with("http://") || o.starts_with("https://")))
        {
            return Err(ValidationError::InvalidCorsOrigin(bad.clone()));
        }
        if self.is_production() && origins.is_empty() {
            return Err(ValidationError::MissingRequired("SERVER__CORS_ORIGINS"));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: Environment::default(),
            log_level: "info,sse_relay=debug,tower_http=info".to_string(),
            request_timeout_secs: 30,
            cors_origins: None,
        }
    }
}
