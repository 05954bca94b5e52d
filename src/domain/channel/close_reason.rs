//! Why a session was closed.

use std::fmt;

/// Reason recorded when a session leaves the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseReason {
    /// The client went away (request cancelled or stream dropped).
    ClientDisconnected,
    /// A write during broadcast failed.
    BroadcastError,
    /// No successful activity within the staleness window.
    StaleConnection,
    /// A keepalive ping could not be written.
    PingFailed,
    /// The connection handshake or replay could not be written.
    HandshakeFailed,
    /// The process is shutting down.
    ServerShutdown,
}

impl CloseReason {
    /// Human readable reason, as logged.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::ClientDisconnected => "client disconnected",
            CloseReason::BroadcastError => "broadcast error",
            CloseReason::StaleConnection => "stale connection",
            CloseReason::PingFailed => "ping failed",
            CloseReason::HandshakeFailed => "handshake failed",
            CloseReason::ServerShutdown => "server shutdown",
        }
    }

    /// Counter name for this reason, e.g. `disconnect_reason_stale_connection`.
    pub fn metric_name(&self) -> String {
        format!("disconnect_reason_{}", self.as_str().replace(' ', "_"))
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
