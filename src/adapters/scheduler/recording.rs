//! Wake scheduler that records requests instead of firing them.
//!
//! Tests deliver wakes by hand, which keeps sweep timing fully under their
//! control.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::ports::{ScheduledWake, SchedulerError, WakeScheduler};

#[derive(Debug, Default)]
pub struct RecordingWakeScheduler {
    scheduled: Mutex<Vec<ScheduledWake>>,
    failing: Mutex<bool>,
}

impl RecordingWakeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// All wakes requested so far, oldest first.
    pub fn scheduled(&self) -> Vec<ScheduledWake> {
        self.scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Most recent wake request.
    pub fn last(&self) -> Option<ScheduledWake> {
        self.scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    pub fn count(&self) -> usize {
        self.scheduled.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Makes subsequent `schedule` calls fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }
}

#[async_trait]
impl WakeScheduler for RecordingWakeScheduler {
    async fn schedule(&self, wake: ScheduledWake) -> Result<(), SchedulerError> {
        if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(SchedulerError::Backend("scheduler unavailable".to_string()));
        }
        self.scheduled
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(wake);
        Ok(())
    }
}
