//! ChannelDirectory - one actor per channel name.
//!
//! Actors are spawned lazily on first use and live as long as the directory.
//! Each actor gets its own metrics instance from the factory; nothing is
//! shared between channels except the clock and the wake scheduler.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

use crate::domain::channel::{ChannelError, ChannelLimits};
use crate::domain::foundation::ChannelName;
use crate::ports::{ChannelMetrics, Clock, WakeScheduler};

use super::channel_actor::ChannelActor;
use super::channel_handle::ChannelHandle;

/// Builds the metrics instance injected into a new channel actor.
pub type MetricsFactory = Arc<dyn Fn(&ChannelName) -> Arc<dyn ChannelMetrics> + Send + Sync>;

struct ChannelEntry {
    handle: ChannelHandle,
    metrics: Arc<dyn ChannelMetrics>,
}

pub struct ChannelDirectory {
    limits: ChannelLimits,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn WakeScheduler>,
    metrics_factory: MetricsFactory,
    channels: RwLock<HashMap<ChannelName, ChannelEntry>>,
    shut_down: AtomicBool,
}

impl ChannelDirectory {
    pub fn new(
        limits: ChannelLimits,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn WakeScheduler>,
        metrics_factory: MetricsFactory,
    ) -> Self {
        Self {
            limits,
            clock,
            scheduler,
            metrics_factory,
            channels: RwLock::new(HashMap::new()),
            shut_down: AtomicBool::new(false),
        }
    }

    pub fn limits(&self) -> &ChannelLimits {
        &self.limits
    }

    /// Returns the handle for `name`, spawning its actor if needed.
    ///
    /// Fails with [`ChannelError::Unavailable`] once [`shutdown`] has run.
    ///
    /// [`shutdown`]: ChannelDirectory::shutdown
    pub async fn get_or_spawn(&self, name: &ChannelName) -> Result<ChannelHandle, ChannelError> {
        if let Some(entry) = self.channels.read().await.get(name) {
            return Ok(entry.handle.clone());
        }

        let mut channels = self.channels.write().await;
        if self.shut_down.load(Ordering::Acquire) {
            return Err(ChannelError::Unavailable);
        }
        // Another request may have spawned it between the two locks.
        if let Some(entry) = channels.get(name) {
            return Ok(entry.handle.clone());
        }

        let metrics = (self.metrics_factory)(name);
        let actor = ChannelActor::new(
            name.clone(),
            self.limits.clone(),
            self.clock.clone(),
            self.scheduler.clone(),
            metrics.clone(),
        );
        let (handle, _task) = ChannelHandle::spawn(actor, self.limits.mailbox_capacity);
        tracing::info!(channel = %name, "channel actor spawned");

        channels.insert(
            name.clone(),
            ChannelEntry {
                handle: handle.clone(),
                metrics,
            },
        );
        Ok(handle)
    }

    /// Returns the handle for `name` without spawning.
    pub async fn get(&self, name: &ChannelName) -> Option<ChannelHandle> {
        self.channels
            .read()
            .await
            .get(name)
            .map(|entry| entry.handle.clone())
    }

    /// Forwards a fired wake to its channel. Wakes for channels without an
    /// actor are dropped; returns whether the wake was delivered.
    pub async fn dispatch_wake(&self, name: &ChannelName) -> bool {
        let Some(handle) = self.get(name).await else {
            tracing::debug!(channel = %name, "wake for unknown channel dropped");
            return false;
        };
        match handle.wake().await {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(channel = %name, error = %err, "failed to deliver wake");
                false
            }
        }
    }

    /// Drains fired wakes until the queue closes or `shutdown` is cancelled.
    ///
    /// Each delivery runs in its own task so a channel with a full mailbox
    /// does not hold up wakes for the others.
    pub async fn run_wake_loop(
        self: Arc<Self>,
        mut wakes: mpsc::UnboundedReceiver<ChannelName>,
        shutdown: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                wake = wakes.recv() => match wake {
                    Some(name) => {
                        let directory = self.clone();
                        tokio::spawn(async move {
                            directory.dispatch_wake(&name).await;
                        });
                    }
                    None => break,
                },
            }
        }
        tracing::debug!("wake loop stopped");
    }

    /// Closes every session on every channel and stops the actors.
    ///
    /// No new channel is spawned afterwards. Returns the number of sessions
    /// closed.
    pub async fn shutdown(&self) -> usize {
        let handles: Vec<ChannelHandle> = {
            let channels = self.channels.write().await;
            self.shut_down.store(true, Ordering::Release);
            channels.values().map(|entry| entry.handle.clone()).collect()
        };

        let mut closed = 0;
        for handle in handles {
            match handle.shutdown().await {
                Ok(count) => closed += count,
                Err(err) => {
                    tracing::warn!(channel = %handle.channel(), error = %err, "channel already stopped");
                }
            }
        }
        tracing::info!(closed, "all channels shut down");
        closed
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Counter snapshot per channel, keyed by channel name.
    pub async fn metrics_snapshot(&self) -> BTreeMap<String, BTreeMap<String, u64>> {
        self.channels
            .read()
            .await
            .iter()
            .map(|(name, entry)| (name.to_string(), entry.metrics.snapshot()))
            .collect()
    }
}
