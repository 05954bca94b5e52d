//! Errors surfaced by channel operations.
//!
//! Only admission and structural input errors reach callers. Per-session
//! write and close failures are absorbed by the actor and never appear here.

use thiserror::Error;

use crate::domain::foundation::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("Too many connections (limit {limit})")]
    CapacityExceeded { limit: usize },

    #[error("Missing body")]
    MissingBody,

    #[error("Message too large ({size} bytes, max {max})")]
    TooLarge { size: u64, max: u64 },

    #[error("Invalid JSON in request body: {0}")]
    InvalidJson(String),

    #[error("Invalid message format: must be a JSON object")]
    NotAnObject,

    #[error("Session {0} already exists")]
    DuplicateSession(SessionId),

    #[error("Channel actor is not running")]
    Unavailable,
}

impl ChannelError {
    /// Counter recorded when an operation is rejected with this error.
    pub fn metric_name(&self) -> &'static str {
        match self {
            ChannelError::CapacityExceeded { .. } => "error_too_many_connections",
            ChannelError::MissingBody => "error_missing_body",
            ChannelError::TooLarge { .. } => "error_message_too_large",
            ChannelError::InvalidJson(_) => "error_invalid_json",
            ChannelError::NotAnObject => "error_invalid_format",
            ChannelError::DuplicateSession(_) => "error_duplicate_session",
            ChannelError::Unavailable => "error_channel_unavailable",
        }
    }
}
