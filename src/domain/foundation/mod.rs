//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers and error types that form the
//! vocabulary of the relay domain.

mod errors;
mod ids;
mod timestamp;

pub use errors::ValidationError;
pub use ids::{ChannelName, MessageId, SessionId, MAX_CHANNEL_NAME_LEN};
pub use timestamp::Timestamp;
