//! Tunable bounds for one channel actor.

use std::time::Duration;

/// Frames written to a new session before any replay: connect, test, comment,
/// plus the replay flush comment.
pub const HANDSHAKE_FRAMES: usize = 4;

/// Resource limits and intervals governing a channel.
///
/// The defaults are the production values; tests shrink them as needed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLimits {
    /// Hard cap on concurrent sessions; admission beyond it is rejected.
    pub max_sessions: usize,
    /// Number of most recent messages kept for replay.
    pub replay_capacity: usize,
    /// Age after which a stored message is dropped by cleanup.
    pub replay_ttl: Duration,
    /// Minimum wall-clock gap between two opportunistic cleanup passes.
    pub cleanup_interval: Duration,
    /// Inactivity after which a session is reaped instead of written to.
    pub stale_after: Duration,
    /// Delay between keepalive sweeps.
    pub ping_interval: Duration,
    /// Largest accepted broadcast body in bytes.
    pub max_body_bytes: u64,
    /// Upper bound on a single sink write or close.
    pub write_timeout: Duration,
    /// Frames a session sink may queue before writes are rejected.
    pub sink_buffer: usize,
    /// Pending commands an actor mailbox may hold.
    pub mailbox_capacity: usize,
}

impl ChannelLimits {
    /// Returns the smallest sink buffer that can hold a full reconnect burst.
    pub fn min_sink_buffer(&self) -> usize {
        self.replay_capacity + HANDSHAKE_FRAMES
    }
}

impl Default for ChannelLimits {
    fn default() -> Self {
        Self {
            max_sessions: 1000,
            replay_capacity: 100,
            replay_ttl: Duration::from_secs(5 * 60),
            cleanup_interval: Duration::from_secs(60),
            stale_after: Duration::from_secs(120),
            ping_interval: Duration::from_secs(30),
            max_body_bytes: 1024 * 1024,
            write_timeout: Duration::from_secs(5),
            sink_buffer: 256,
            mailbox_capacity: 256,
        }
    }
}
