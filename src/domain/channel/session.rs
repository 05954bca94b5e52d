//! Session records and the per-channel session table.

use std::collections::HashMap;

use crate::domain::foundation::{SessionId, Timestamp};

use super::ChannelError;

/// Request metadata recorded with a session for observability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    pub client_ip: String,
    pub user_agent: String,
    /// Trace identifier from the router; never used for decisions.
    pub request_id: String,
}

impl SessionMetadata {
    /// Maximum user agent length written to logs.
    pub const LOGGED_USER_AGENT_LEN: usize = 100;

    /// User agent truncated for log output.
    pub fn user_agent_for_log(&self) -> &str {
        match self.user_agent.char_indices().nth(Self::LOGGED_USER_AGENT_LEN) {
            Some((end, _)) => &self.user_agent[..end],
            None => &self.user_agent,
        }
    }
}

impl Default for SessionMetadata {
    fn default() -> Self {
        Self {
            client_ip: "unknown".to_string(),
            user_agent: "unknown".to_string(),
            request_id: String::new(),
        }
    }
}

/// One live client connection.
///
/// Generic over the sink type so the table stays independent of transport.
#[derive(Debug)]
pub struct Session<S> {
    pub id: SessionId,
    pub sink: S,
    pub connected_at: Timestamp,
    pub last_activity_at: Timestamp,
    pub metadata: SessionMetadata,
}

impl<S> Session<S> {
    pub fn new(id: SessionId, sink: S, metadata: SessionMetadata, now: Timestamp) -> Self {
        Self {
            id,
            sink,
            connected_at: now,
            last_activity_at: now,
            metadata,
        }
    }

    /// True if the last activity happened before `threshold`.
    pub fn is_stale(&self, threshold: Timestamp) -> bool {
        self.last_activity_at.is_before(&threshold)
    }
}

/// Capacity-bounded map of live sessions.
///
/// Removal is total: a removed id leaves nothing behind.
#[derive(Debug)]
pub struct SessionTable<S> {
    sessions: HashMap<SessionId, Session<S>>,
    capacity: usize,
}

impl<S> SessionTable<S> {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            capacity,
        }
    }

    /// Fails with `CapacityExceeded` when the table is full.
    pub fn ensure_capacity(&self) -> Result<(), ChannelError> {
        if self.sessions.len() >= self.capacity {
            return Err(ChannelError::CapacityExceeded {
                limit: self.capacity,
            });
        }
        Ok(())
    }

    /// Inserts a session, enforcing capacity and id uniqueness.
    pub fn insert(&mut self, session: Session<S>) -> Result<(), ChannelError> {
        self.ensure_capacity()?;
        if self.sessions.contains_key(&session.id) {
            return Err(ChannelError::DuplicateSession(session.id));
        }
        self.sessions.insert(session.id, session);
        Ok(())
    }

    pub fn remove(&mut self, id: &SessionId) -> Option<Session<S>> {
        self.sessions.remove(id)
    }

    pub fn get(&self, id: &SessionId) -> Option<&Session<S>> {
        self.sessions.get(id)
    }

    /// Records activity for a session still in the table.
    pub fn touch(&mut self, id: &SessionId, now: Timestamp) -> bool {
        match self.sessions.get_mut(id) {
            Some(session) => {
                session.last_activity_at = now;
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &Session<S>> {
        self.sessions.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Session<S>> {
        self.sessions.values_mut()
    }
}
