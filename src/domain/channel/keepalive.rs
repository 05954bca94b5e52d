//! Keepalive scheduling state machine.
//!
//! ```text
//!            first session admitted
//!   Idle ──────────────────────────────▶ Armed(now + interval)
//!    ▲                                      │ wake fires, sweep runs
//!    │   no sessions left after sweep       │
//!    └──────────────────────────────────────┤
//!                                           │ sessions remain
//!                                           ▼
//!                                    Armed(now + interval)
//! ```
//!
//! The state only decides *when* a wake must be requested; the actor owns the
//! scheduler call. Re-arming after a sweep is mandatory: skipping it silently
//! stops all future pings for the channel.

use std::time::Duration;

use crate::domain::foundation::Timestamp;

/// Whether a keepalive wake is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepaliveState {
    #[default]
    Idle,
    Armed {
        wake_at: Timestamp,
    },
}

impl KeepaliveState {
    pub fn is_armed(&self) -> bool {
        matches!(self, KeepaliveState::Armed { .. })
    }

    /// Time of the outstanding wake, if any.
    pub fn wake_at(&self) -> Option<Timestamp> {
        match self {
            KeepaliveState::Armed { wake_at } => Some(*wake_at),
            KeepaliveState::Idle => None,
        }
    }

    /// Idle → Armed on admission. Returns the wake time to schedule, or
    /// `None` when a wake is already outstanding.
    pub fn on_session_admitted(&mut self, now: Timestamp, interval: Duration) -> Option<Timestamp> {
        match self {
            KeepaliveState::Idle => {
                let wake_at = now.plus(interval);
                *self = KeepaliveState::Armed { wake_at };
                Some(wake_at)
            }
            KeepaliveState::Armed { .. } => None,
        }
    }

    /// Transition after a sweep. Returns the next wake time when sessions
    /// remain (Armed → Armed), otherwise moves to Idle and returns `None`.
    pub fn after_sweep(
        &mut self,
        remaining_sessions: usize,
        now: Timestamp,
        interval: Duration,
    ) -> Option<Timestamp> {
        if remaining_sessions == 0 {
            *self = KeepaliveState::Idle;
            return None;
        }
        let wake_at = now.plus(interval);
        *self = KeepaliveState::Armed { wake_at };
        Some(wake_at)
    }

    /// Falls back to Idle when a wake could not be scheduled, so the next
    /// admission retries.
    pub fn disarm(&mut self) {
        *self = KeepaliveState::Idle;
    }
}
