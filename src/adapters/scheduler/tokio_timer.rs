//! In-process wake scheduler backed by tokio timers.
//!
//! Each channel has at most one pending timer task; scheduling again aborts
//! the previous one. Fired wakes are delivered as channel names on an
//! unbounded queue that the [`ChannelDirectory`] drains.
//!
//! Timers do not survive a process restart. Channels lose their sessions on
//! restart as well, so nothing is left to ping.
//!
//! [`ChannelDirectory`]: crate::application::ChannelDirectory

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::domain::foundation::ChannelName;
use crate::ports::{Clock, ScheduledWake, SchedulerError, WakeScheduler};

/// Receiving end of fired wakes.
pub type WakeReceiver = mpsc::UnboundedReceiver<ChannelName>;

pub struct TokioWakeScheduler {
    clock: Arc<dyn Clock>,
    wakes: mpsc::UnboundedSender<ChannelName>,
    pending: Mutex<HashMap<ChannelName, JoinHandle<()>>>,
    shutdown: CancellationToken,
}

impl TokioWakeScheduler {
    /// Creates the scheduler and the queue its wakes are delivered on.
    pub fn new(clock: Arc<dyn Clock>) -> (Self, WakeReceiver) {
        let (wakes, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            clock,
            wakes,
            pending: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        };
        (scheduler, rx)
    }

    /// Number of channels with a timer that has not fired yet.
    pub fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .filter(|handle| !handle.is_finished())
            .count()
    }

    /// Cancels every pending timer and refuses new ones.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in pending.drain() {
            handle.abort();
        }
    }
}

#[async_trait]
impl WakeScheduler for TokioWakeScheduler {
    async fn schedule(&self, wake: ScheduledWake) -> Result<(), SchedulerError> {
        if self.shutdown.is_cancelled() {
            return Err(SchedulerError::ShutDown);
        }

        let delay = Duration::from_millis(wake.at.millis_since(&self.clock.now()));
        let tx = self.wakes.clone();
        let token = self.shutdown.clone();
        let channel = wake.channel.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    if tx.send(channel.clone()).is_err() {
                        tracing::debug!(channel = %channel, "wake dropped, receiver gone");
                    }
                }
            }
        });

        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|_, handle| !handle.is_finished());
        if let Some(previous) = pending.insert(wake.channel, handle) {
            previous.abort();
        }
        Ok(())
    }
}

impl Drop for TokioWakeScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
