//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {0}")]
    InvalidSocketAddr(String),

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Invalid CORS origin: {0}")]
    InvalidCorsOrigin(String),

    #[error("Channel setting must be greater than zero: {0}")]
    ZeroChannelLimit(&'static str),

    #[error("Sink buffer {sink_buffer} cannot hold a reconnect burst of {required} frames")]
    SinkBufferTooSmall { sink_buffer: usize, required: usize },

    #[error("Rate limit must allow at least one request: {0}")]
    ZeroRateLimit(&'static str),

    #[error("API token must be at least {0} characters")]
    ApiTokenTooShort(usize),
}
