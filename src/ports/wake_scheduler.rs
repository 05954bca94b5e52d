//! WakeScheduler port - durable "call me back later" primitive.
//!
//! Models a scheduled wake carrying a channel name. The actor asks for one
//! wake at a time; asking again replaces the pending one. Implementations may
//! be an in-process timer, a persisted delay queue or a cron-like service, as
//! long as a wake that was accepted is eventually delivered to the channel.

use async_trait::async_trait;

use crate::domain::foundation::{ChannelName, Timestamp};

/// A wake request for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledWake {
    pub channel: ChannelName,
    pub at: Timestamp,
}

/// Errors raised while scheduling a wake.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    /// The scheduler stopped accepting wakes (e.g. during shutdown).
    #[error("scheduler is shut down")]
    ShutDown,

    /// Backend failure.
    #[error("scheduler backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait WakeScheduler: Send + Sync {
    /// Schedules a wake, replacing any pending wake for the same channel.
    async fn schedule(&self, wake: ScheduledWake) -> Result<(), SchedulerError>;
}
