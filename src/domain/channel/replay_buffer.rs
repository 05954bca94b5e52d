//! Bounded, time-windowed history of broadcast messages.
//!
//! The buffer backfills reconnecting clients. It is best-effort and lives in
//! memory only: capacity overflow evicts the oldest entry, and entries older
//! than the TTL are dropped by an opportunistic, time-gated cleanup rather
//! than by a timer of their own.

use std::collections::VecDeque;
use std::time::Duration;

use bytes::Bytes;

use crate::domain::foundation::{MessageId, Timestamp};

use super::frame;

/// A broadcast message retained for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    /// Insertion sequence, strictly increasing within one buffer.
    pub seq: u64,
    pub id: MessageId,
    /// Serialized JSON payload.
    pub payload: String,
    /// Pre-built event-stream frame for `id` and `payload`.
    pub frame: Bytes,
    pub timestamp: Timestamp,
}

/// Result of looking up messages missed since a client's last event id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayLookup {
    /// Messages to resend, oldest first.
    pub messages: Vec<StoredMessage>,
    /// Whether the last event id was found in the buffer.
    ///
    /// When it is not, `messages` is the whole buffer: an evicted id and a
    /// bogus one are indistinguishable, and both are treated as "missed
    /// everything".
    pub matched: bool,
}

/// Outcome of appending one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendOutcome {
    /// Frame built for the new message, shared with the fan-out.
    pub frame: Bytes,
    /// True when the append pushed the oldest message out.
    pub trimmed: bool,
}

/// FIFO replay buffer with capacity and TTL bounds.
#[derive(Debug)]
pub struct ReplayBuffer {
    messages: VecDeque<StoredMessage>,
    capacity: usize,
    ttl: Duration,
    cleanup_interval: Duration,
    last_cleanup: Timestamp,
    next_seq: u64,
}

impl ReplayBuffer {
    /// Creates an empty buffer. `created_at` starts the cleanup gate.
    pub fn new(
        capacity: usize,
        ttl: Duration,
        cleanup_interval: Duration,
        created_at: Timestamp,
    ) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
            ttl,
            cleanup_interval,
            last_cleanup: created_at,
            next_seq: 0,
        }
    }

    /// Appends a message at the tail, evicting the head if over capacity.
    pub fn append(&mut self, id: MessageId, payload: String, now: Timestamp) -> AppendOutcome {
        let frame = frame::message(&id, &payload);
        self.messages.push_back(StoredMessage {
            seq: self.next_seq,
            id,
            payload,
            frame: frame.clone(),
            timestamp: now,
        });
        self.next_seq += 1;

        let mut trimmed = false;
        while self.messages.len() > self.capacity {
            self.messages.pop_front();
            trimmed = true;
        }
        AppendOutcome { frame, trimmed }
    }

    /// Returns the messages strictly after `last_event_id`, or the entire
    /// buffer when the id is not present.
    pub fn messages_since(&self, last_event_id: &MessageId) -> ReplayLookup {
        match self.messages.iter().position(|m| &m.id == last_event_id) {
            Some(index) => ReplayLookup {
                messages: self.messages.iter().skip(index + 1).cloned().collect(),
                matched: true,
            },
            None => ReplayLookup {
                messages: self.messages.iter().cloned().collect(),
                matched: false,
            },
        }
    }

    /// Drops every message whose age has reached the TTL.
    ///
    /// Returns how many were removed.
    pub fn remove_expired(&mut self, now: Timestamp) -> usize {
        let ttl_ms = self.ttl.as_millis() as u64;
        let before = self.messages.len();
        self.messages
            .retain(|m| now.millis_since(&m.timestamp) < ttl_ms);
        before - self.messages.len()
    }

    /// Runs [`remove_expired`](Self::remove_expired) if more than the cleanup
    /// interval has passed since the previous pass.
    ///
    /// Returns `None` when the gate is still closed.
    pub fn cleanup_if_due(&mut self, now: Timestamp) -> Option<usize> {
        if now.millis_since(&self.last_cleanup) <= self.cleanup_interval.as_millis() as u64 {
            return None;
        }
        self.last_cleanup = now;
        Some(self.remove_expired(now))
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterates stored messages oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &StoredMessage> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn t0() -> Timestamp {
        Timestamp::from_unix_millis(1_700_000_000_000)
    }

    fn buffer(capacity: usize) -> ReplayBuffer {
        ReplayBuffer::new(
            capacity,
            Duration::from_secs(300),
            Duration::from_secs(60),
            t0(),
        )
    }

    fn id(n: usize) -> MessageId {
        MessageId::from_client(format!("m{n}"))
    }

    fn ids(messages: &[StoredMessage]) -> Vec<String> {
        messages.iter().map(|m| m.id.to_string()).collect()
    }

    #[test]
    fn replays_messages_strictly_after_last_event_id() {
        let mut buf = buffer(100);
        for n in 1..=5 {
            buf.append(id(n), format!("{{\"n\":{n}}}"), t0());
        }

        let lookup = buf.messages_since(&id(3));

        assert!(lookup.matched);
        assert_eq!(ids(&lookup.messages), vec!["m4", "m5"]);
    }

    #[test]
    fn last_event_id_at_tail_replays_nothing() {
        let mut buf = buffer(100);
        buf.append(id(1), "{}".into(), t0());
        buf.append(id(2), "{}".into(), t0());

        let lookup = buf.messages_since(&id(2));

        assert!(lookup.matched);
        assert!(lookup.messages.is_empty());
    }

    #[test]
    fn unknown_last_event_id_replays_whole_buffer() {
        let mut buf = buffer(100);
        for n in 1..=3 {
            buf.append(id(n), "{}".into(), t0());
        }

        let lookup = buf.messages_since(&MessageId::from_client("unknown"));

        assert!(!lookup.matched);
        assert_eq!(ids(&lookup.messages), vec!["m1", "m2", "m3"]);
    }

    #[test]
    fn keeps_only_most_recent_capacity_messages() {
        let mut buf = buffer(100);
        for n in 1..=150 {
            buf.append(id(n), "{}".into(), t0());
        }

        assert_eq!(buf.len(), 100);
        let first = buf.iter().next().unwrap();
        assert_eq!(first.id, id(51));
        assert_eq!(buf.iter().last().unwrap().id, id(150));
    }

    #[test]
    fn append_reports_trim() {
        let mut buf = buffer(1);
        assert!(!buf.append(id(1), "{}".into(), t0()).trimmed);
        assert!(buf.append(id(2), "{}".into(), t0()).trimmed);
    }

    #[test]
    fn stored_frame_matches_payload() {
        let mut buf = buffer(10);
        buf.append(id(1), r#"{"a":1}"#.into(), t0());
        let stored = buf.iter().next().unwrap();
        assert_eq!(&stored.frame[..], b"id: m1\ndata: {\"a\":1}\n\n");
    }

    #[test]
    fn expired_messages_removed_fresh_ones_kept() {
        let mut buf = buffer(100);
        let now = t0().plus_secs(600);
        buf.append(id(1), "{}".into(), now.minus(Duration::from_secs(301)));
        buf.append(id(2), "{}".into(), now.minus(Duration::from_secs(300)));
        buf.append(id(3), "{}".into(), now.minus(Duration::from_secs(299)));

        let removed = buf.remove_expired(now);

        assert_eq!(removed, 2);
        assert_eq!(ids(&buf.iter().cloned().collect::<Vec<_>>()), vec!["m3"]);
    }

    #[test]
    fn message_aged_four_minutes_fifty_nine_survives_cleanup() {
        let mut buf = buffer(100);
        buf.append(id(1), "{}".into(), t0());

        let removed = buf.remove_expired(t0().plus(Duration::from_secs(4 * 60 + 59)));

        assert_eq!(removed, 0);
        assert_eq!(buf.len(), 1);
    }

    #[test]
    fn cleanup_is_gated_by_interval() {
        let mut buf = buffer(100);
        buf.append(id(1), "{}".into(), t0());

        // Exactly one interval later the gate is still closed.
        assert_eq!(buf.cleanup_if_due(t0().plus_secs(60)), None);
        assert_eq!(buf.len(), 1);

        let later = t0().plus_secs(400);
        assert_eq!(buf.cleanup_if_due(later), Some(1));
        assert!(buf.is_empty());

        // Gate closes again right after a pass.
        assert_eq!(buf.cleanup_if_due(later.plus_secs(30)), None);
    }

    proptest! {
        #[test]
        fn buffer_preserves_insertion_order_and_bound(
            capacity in 1usize..64,
            count in 0usize..200,
        ) {
            let mut buf = buffer(capacity);
            for n in 0..count {
                buf.append(id(n), "{}".into(), t0());
            }

            prop_assert_eq!(buf.len(), count.min(capacity));
            let seqs: Vec<u64> = buf.iter().map(|m| m.seq).collect();
            prop_assert!(seqs.windows(2).all(|w| w[0] + 1 == w[1]));
            if let Some(last) = buf.iter().last() {
                prop_assert_eq!(last.seq as usize, count - 1);
            }
        }
    }
}
