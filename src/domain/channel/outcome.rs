//! Transient results of channel operations.

use crate::domain::foundation::{ChannelName, MessageId, Timestamp};

/// Aggregate result of one broadcast fan-out.
///
/// `success + failure + stale` equals the number of sessions that were live
/// when the broadcast started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastOutcome {
    pub message_id: MessageId,
    pub success: usize,
    pub failure: usize,
    pub stale: usize,
    /// Sessions remaining after the fan-out.
    pub clients: usize,
    pub duration_ms: u64,
}

impl BroadcastOutcome {
    /// Number of sessions the fan-out considered.
    pub fn attempted(&self) -> usize {
        self.success + self.failure + self.stale
    }
}

/// Result of one keepalive sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOutcome {
    pub pinged: usize,
    pub failed: usize,
    /// When the next sweep is due; `None` once the channel went idle.
    pub next_wake: Option<Timestamp>,
}

/// Point-in-time view of a channel for health and debugging endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStats {
    pub channel: ChannelName,
    pub clients: usize,
    pub buffered_messages: usize,
    pub next_wake: Option<Timestamp>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempted_sums_all_buckets() {
        let outcome = BroadcastOutcome {
            message_id: MessageId::new(),
            success: 3,
            failure: 1,
            stale: 2,
            clients: 3,
            duration_ms: 0,
        };
        assert_eq!(outcome.attempted(), 6);
    }
}
