//! Channel actor configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::channel::ChannelLimits;

/// Per-channel limits and intervals
///
/// Every field defaults to the production value from [`ChannelLimits`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    pub max_sessions: usize,
    pub replay_capacity: usize,
    pub replay_ttl_secs: u64,
    pub cleanup_interval_secs: u64,
    pub stale_after_secs: u64,
    pub ping_interval_secs: u64,
    pub max_body_bytes: u64,
    pub write_timeout_ms: u64,
    pub sink_buffer: usize,
    pub mailbox_capacity: usize,
}

impl ChannelConfig {
    pub fn to_limits(&self) -> ChannelLimits {
        ChannelLimits {
            max_sessions: self.max_sessions,
            replay_capacity: self.replay_capacity,
            replay_ttl: Duration::from_secs(self.replay_ttl_secs),
            cleanup_interval: Duration::from_secs(self.cleanup_interval_secs),
            stale_after: Duration::from_secs(self.stale_after_secs),
            ping_interval: Duration::from_secs(self.ping_interval_secs),
            max_body_bytes: self.max_body_bytes,
            write_timeout: Duration::from_millis(self.write_timeout_ms),
            sink_buffer: self.sink_buffer,
            mailbox_capacity: self.mailbox_capacity,
        }
    }

    /// Validate channel configuration
    ///
    /// A session's sink must be able to queue the handshake plus a full
    /// replay without the writes being rejected.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let non_zero = [
            ("MAX_SESSIONS", self.max_sessions as u64),
            ("REPLAY_CAPACITY", self.replay_capacity as u64),
            ("REPLAY_TTL_SECS", self.replay_ttl_secs),
            ("STALE_AFTER_SECS", self.stale_after_secs),
            ("PING_INTERVAL_SECS", self.ping_interval_secs),
            ("MAX_BODY_BYTES", self.max_body_bytes),
            ("WRITE_TIMEOUT_MS", self.write_timeout_ms),
            ("MAILBOX_CAPACITY", self.mailbox_capacity as u64),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ValidationError::ZeroChannelLimit(name));
        }

        let required = self.to_limits().min_sink_buffer();
        if self.sink_buffer < required {
            return Err(ValidationError::SinkBufferTooSmall {
                sink_buffer: self.sink_buffer,
                required,
            });
        }
        Ok(())
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        let limits = ChannelLimits::default();
        Self {
            max_sessions: limits.max_sessions,
            replay_capacity: limits.replay_capacity,
            replay_ttl_secs: limits.replay_ttl.as_secs(),
            cleanup_interval_secs: limits.cleanup_interval.as_secs(),
            stale_after_secs: limits.stale_after.as_secs(),
            ping_interval_secs: limits.ping_interval.as_secs(),
            max_body_bytes: limits.max_body_bytes,
            write_timeout_ms: limits.write_timeout.as_millis() as u64,
            sink_buffer: limits.sink_buffer,
            mailbox_capacity: limits.mailbox_capacity,
        }
    }
}
