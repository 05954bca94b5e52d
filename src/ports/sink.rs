//! Sink port - per-session output capability.
//!
//! A sink accepts complete event-stream frames for one client. Any transport
//! can implement it: an in-process channel feeding an HTTP body, a socket
//! writer, or a test double.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

/// Failure to write to or close a sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    /// The client side is gone.
    #[error("sink closed")]
    Closed,

    /// The write did not settle in time.
    #[error("write timed out after {0:?}")]
    TimedOut(Duration),

    /// The sink refused the frame (e.g. its buffer is full).
    #[error("write rejected: {0}")]
    Rejected(String),
}

/// Output side of one session.
///
/// Implementations must resolve promptly: a failing or congested client must
/// produce an error rather than block. Callers additionally bound every call
/// with a timeout.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Pushes one complete frame.
    async fn push(&self, frame: Bytes) -> Result<(), SinkError>;

    /// Ends the stream. Closing an already closed sink is not an error.
    async fn close(&self) -> Result<(), SinkError>;
}
