//! ChannelActor - the single owner of one channel's state.
//!
//! The actor composes the session table, the replay buffer and the keepalive
//! state machine, and performs all sink I/O. Every operation takes
//! `&mut self`, so whoever owns the actor serializes access to it; in the
//! running service that is the task behind a [`ChannelHandle`].
//!
//! Per-session failures never escape an operation. A write that errors or
//! exceeds the write timeout turns into a local close, and only admission and
//! input errors are returned to callers.
//!
//! [`ChannelHandle`]: super::ChannelHandle

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;

use crate::domain::channel::frame::{self, HANDSHAKE_COMMENT};
use crate::domain::channel::{
    validate_broadcast_body, BroadcastOutcome, ChannelError, ChannelLimits, ChannelStats,
    CloseReason, KeepaliveState, ReplayBuffer, Session, SessionMetadata, SessionTable,
    SweepOutcome,
};
use crate::domain::foundation::{ChannelName, MessageId, SessionId, Timestamp};
use crate::ports::{ChannelMetrics, Clock, ScheduledWake, Sink, SinkError, WakeScheduler};

/// Shared handle to a session's sink.
pub type SharedSink = Arc<dyn Sink>;

/// Raw broadcast input as received from the transport.
#[derive(Debug, Clone, Default)]
pub struct BroadcastRequest {
    pub body: Option<Bytes>,
    /// Length announced by the transport; zero when not declared.
    pub declared_length: u64,
    /// Trace identifier, only logged.
    pub request_id: String,
}

pub struct ChannelActor {
    channel: ChannelName,
    limits: ChannelLimits,
    sessions: SessionTable<SharedSink>,
    replay: ReplayBuffer,
    keepalive: KeepaliveState,
    clock: Arc<dyn Clock>,
    scheduler: Arc<dyn WakeScheduler>,
    metrics: Arc<dyn ChannelMetrics>,
}

impl ChannelActor {
    pub fn new(
        channel: ChannelName,
        limits: ChannelLimits,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn WakeScheduler>,
        metrics: Arc<dyn ChannelMetrics>,
    ) -> Self {
        let now = clock.now();
        Self {
            sessions: SessionTable::new(limits.max_sessions),
            replay: ReplayBuffer::new(
                limits.replay_capacity,
                limits.replay_ttl,
                limits.cleanup_interval,
                now,
            ),
            keepalive: KeepaliveState::default(),
            channel,
            limits,
            clock,
            scheduler,
            metrics,
        }
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    pub fn client_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn keepalive(&self) -> KeepaliveState {
        self.keepalive
    }

    pub fn replay_buffer(&self) -> &ReplayBuffer {
        &self.replay
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            channel: self.channel.clone(),
            clients: self.sessions.len(),
            buffered_messages: self.replay.len(),
            next_wake: self.keepalive.wake_at(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Admission
    // ════════════════════════════════════════════════════════════════════════

    /// Admits a new session and writes its handshake, plus a replay of missed
    /// messages when `last_event_id` is given.
    ///
    /// Rejection at capacity mutates nothing. If the handshake cannot be
    /// written the session is closed again before this returns; the id is
    /// still returned and the sink is already closed.
    pub async fn open_connection(
        &mut self,
        metadata: SessionMetadata,
        last_event_id: Option<MessageId>,
        sink: SharedSink,
    ) -> Result<SessionId, ChannelError> {
        let now = self.clock.now();
        self.run_cleanup(now);
        self.metrics.increment("channel_request_open", 1);

        if let Err(err) = self.sessions.ensure_capacity() {
            self.metrics.increment(err.metric_name(), 1);
            tracing::warn!(
                client_ip = %metadata.client_ip,
                request_id = %metadata.request_id,
                clients = self.sessions.len(),
                "connection rejected, channel at capacity"
            );
            return Err(err);
        }

        // 1. Register the session
        let id = SessionId::new();
        let is_reconnect = last_event_id.is_some();
        tracing::info!(
            session_id = %id,
            client_ip = %metadata.client_ip,
            user_agent = metadata.user_agent_for_log(),
            request_id = %metadata.request_id,
            is_reconnect,
            "client connecting"
        );
        self.sessions
            .insert(Session::new(id, sink.clone(), metadata, now))?;
        self.metrics.increment("client_connected", 1);

        // 2. Handshake frames, then any replay
        let mut frames = vec![
            frame::connect(&self.channel, self.sessions.len(), now),
            frame::test_event(&self.channel, now),
            frame::comment(HANDSHAKE_COMMENT, now),
        ];
        if let Some(last_event_id) = last_event_id {
            frames.extend(self.replay_frames(&id, &last_event_id));
        }

        let timeout = self.limits.write_timeout;
        for frame in frames {
            if let Err(err) = write_frame(&sink, frame, timeout).await {
                tracing::warn!(session_id = %id, error = %err, "handshake write failed");
                self.close(id, CloseReason::HandshakeFailed).await;
                return Ok(id);
            }
        }

        // 3. First session arms the keepalive
        if let Some(wake_at) = self.keepalive.on_session_admitted(now, self.limits.ping_interval) {
            tracing::debug!(next_ping_at = %wake_at.as_datetime(), "scheduled first keepalive");
            self.request_wake(wake_at).await;
        }

        tracing::info!(
            session_id = %id,
            clients = self.sessions.len(),
            connect_duration_ms = self.clock.now().millis_since(&now),
            "client connected"
        );
        Ok(id)
    }

    fn replay_frames(&self, id: &SessionId, last_event_id: &MessageId) -> Vec<Bytes> {
        self.metrics.increment("client_reconnect", 1);

        let lookup = self.replay.messages_since(last_event_id);
        if !lookup.matched {
            self.metrics.increment("last_event_id_not_found", 1);
            tracing::warn!(
                session_id = %id,
                last_event_id = %last_event_id,
                "last event id not in replay buffer, sending everything"
            );
        }
        self.metrics
            .increment("missed_messages_sent", lookup.messages.len() as u64);
        tracing::debug!(session_id = %id, count = lookup.messages.len(), "sending missed messages");

        let mut frames: Vec<Bytes> = lookup.messages.into_iter().map(|m| m.frame).collect();
        frames.push(frame::replay_flush());
        frames
    }

    // ════════════════════════════════════════════════════════════════════════
    // Close
    // ════════════════════════════════════════════════════════════════════════

    /// Removes a session and closes its sink.
    ///
    /// Idempotent: returns `false`, records nothing and logs nothing when the
    /// session is already gone. Sink close errors are logged and swallowed.
    pub async fn close(&mut self, id: SessionId, reason: CloseReason) -> bool {
        let Some(session) = self.sessions.remove(&id) else {
            return false;
        };

        if let Err(err) = close_sink(&session.sink, self.limits.write_timeout).await {
            tracing::warn!(session_id = %id, reason = %reason, error = %err, "error closing sink");
        }

        self.metrics.increment("client_disconnected", 1);
        self.metrics.increment(&reason.metric_name(), 1);
        tracing::info!(
            session_id = %id,
            reason = %reason,
            clients = self.sessions.len(),
            connection_duration_ms = self.clock.now().millis_since(&session.connected_at),
            "client disconnected"
        );
        true
    }

    // ════════════════════════════════════════════════════════════════════════
    // Broadcast
    // ════════════════════════════════════════════════════════════════════════

    /// Validates, stores and fans out one message.
    ///
    /// All writes run concurrently and the call returns once every one has
    /// settled. Stale sessions are closed instead of written to.
    pub async fn broadcast(
        &mut self,
        request: BroadcastRequest,
    ) -> Result<BroadcastOutcome, ChannelError> {
        let started = self.clock.now();
        self.run_cleanup(started);
        self.metrics.increment("channel_request_broadcast", 1);

        // 1. Validate before touching any state
        let payload = match validate_broadcast_body(
            request.body.as_deref(),
            request.declared_length,
            self.limits.max_body_bytes,
        ) {
            Ok(payload) => payload,
            Err(err) => {
                self.metrics.increment(err.metric_name(), 1);
                tracing::warn!(request_id = %request.request_id, error = %err, "broadcast rejected");
                return Err(err);
            }
        };
        let data_size = payload.len();

        // 2. Store for replay; the stored frame is reused for delivery
        let message_id = MessageId::new();
        let appended = self.replay.append(message_id.clone(), payload, started);
        self.metrics.increment("message_stored", 1);
        if appended.trimmed {
            self.metrics.increment("message_trimmed", 1);
        }

        // 3. Split live sessions into stale and writable
        let stale_threshold = started.minus(self.limits.stale_after);
        let mut stale = Vec::new();
        let mut targets = Vec::with_capacity(self.sessions.len());
        for session in self.sessions.iter_mut() {
            if session.is_stale(stale_threshold) {
                stale.push(session.id);
                continue;
            }
            // Optimistic: a slow but alive link must not look stale next time.
            session.last_activity_at = started;
            targets.push((session.id, session.sink.clone()));
        }

        for id in &stale {
            self.close(*id, CloseReason::StaleConnection).await;
        }

        // 4. Fan out
        let timeout = self.limits.write_timeout;
        let results = join_all(targets.into_iter().map(|(id, sink)| {
            let frame = appended.frame.clone();
            async move { (id, write_frame(&sink, frame, timeout).await) }
        }))
        .await;

        let mut success = 0;
        let mut failure = 0;
        for (id, result) in results {
            match result {
                Ok(()) => success += 1,
                Err(err) => {
                    failure += 1;
                    tracing::warn!(session_id = %id, error = %err, "error sending to client");
                    self.close(id, CloseReason::BroadcastError).await;
                }
            }
        }

        let outcome = BroadcastOutcome {
            message_id,
            success,
            failure,
            stale: stale.len(),
            clients: self.sessions.len(),
            duration_ms: self.clock.now().millis_since(&started),
        };

        self.metrics.increment("broadcast_complete", 1);
        self.metrics.increment("broadcast_success", success as u64);
        self.metrics.increment("broadcast_failure", failure as u64);
        self.metrics
            .increment("stale_connections_removed", outcome.stale as u64);
        tracing::info!(
            request_id = %request.request_id,
            message_id = %outcome.message_id,
            clients = outcome.clients,
            success_count = outcome.success,
            failure_count = outcome.failure,
            stale_count = outcome.stale,
            duration_ms = outcome.duration_ms,
            data_size,
            "broadcast complete"
        );
        Ok(outcome)
    }

    // ════════════════════════════════════════════════════════════════════════
    // Keepalive
    // ════════════════════════════════════════════════════════════════════════

    /// Runs a keepalive sweep in response to a scheduled wake.
    ///
    /// Each session gets a structured ping and a comment ping. Any failure
    /// closes the session. The wake is re-armed while sessions remain.
    pub async fn handle_wake(&mut self) -> SweepOutcome {
        let now = self.clock.now();
        self.run_cleanup(now);

        let ping = frame::ping(&self.channel, now);
        let comment = frame::ping_comment(now);
        let timeout = self.limits.write_timeout;
        let targets: Vec<(SessionId, SharedSink)> = self
            .sessions
            .iter()
            .map(|session| (session.id, session.sink.clone()))
            .collect();

        let results = join_all(targets.into_iter().map(|(id, sink)| {
            let ping = ping.clone();
            let comment = comment.clone();
            async move {
                let result = match write_frame(&sink, ping, timeout).await {
                    Ok(()) => write_frame(&sink, comment, timeout).await,
                    Err(err) => Err(err),
                };
                (id, result)
            }
        }))
        .await;

        let mut pinged = 0;
        let mut failed = 0;
        for (id, result) in results {
            match result {
                Ok(()) => {
                    pinged += 1;
                    self.sessions.touch(&id, now);
                }
                Err(err) => {
                    failed += 1;
                    tracing::warn!(session_id = %id, error = %err, "ping failed");
                    self.close(id, CloseReason::PingFailed).await;
                }
            }
        }
        self.metrics.increment("ping_sent", pinged as u64);
        self.metrics.increment("ping_failed", failed as u64);

        match self
            .keepalive
            .after_sweep(self.sessions.len(), now, self.limits.ping_interval)
        {
            Some(wake_at) => self.request_wake(wake_at).await,
            None => tracing::debug!("no sessions left, keepalive idle"),
        }

        tracing::debug!(pinged, failed, clients = self.sessions.len(), "keepalive sweep done");
        SweepOutcome {
            pinged,
            failed,
            next_wake: self.keepalive.wake_at(),
        }
    }

    // ════════════════════════════════════════════════════════════════════════
    // Shutdown
    // ════════════════════════════════════════════════════════════════════════

    /// Closes every session with [`CloseReason::ServerShutdown`] and leaves
    /// keepalive idle. Returns the number of sessions closed.
    ///
    /// Closing the sinks ends the event streams, which lets the HTTP server
    /// finish draining its connections.
    pub async fn shutdown(&mut self) -> usize {
        let ids: Vec<SessionId> = self.sessions.iter().map(|session| session.id).collect();
        let mut closed = 0;
        for id in ids {
            if self.close(id, CloseReason::ServerShutdown).await {
                closed += 1;
            }
        }
        self.keepalive.disarm();
        tracing::info!(closed, "channel shut down");
        closed
    }

    async fn request_wake(&mut self, at: Timestamp) {
        let wake = ScheduledWake {
            channel: self.channel.clone(),
            at,
        };
        if let Err(err) = self.scheduler.schedule(wake).await {
            // Idle again so the next admission retries.
            self.keepalive.disarm();
            self.metrics.increment("error_schedule_failed", 1);
            tracing::error!(error = %err, "failed to schedule keepalive wake");
        }
    }

    fn run_cleanup(&mut self, now: Timestamp) {
        if let Some(removed) = self.replay.cleanup_if_due(now) {
            if removed > 0 {
                self.metrics.increment("messages_cleaned_up", removed as u64);
                tracing::debug!(removed, remaining = self.replay.len(), "expired messages removed");
            }
        }
    }
}

async fn write_frame(sink: &SharedSink, frame: Bytes, timeout: Duration) -> Result<(), SinkError> {
    match tokio::time::timeout(timeout, sink.push(frame)).await {
        Ok(result) => result,
        Err(_) => Err(SinkError::TimedOut(timeout)),
    }
}

async fn close_sink(sink: &SharedSink, timeout: Duration) -> Result<(), SinkError> {
    match tokio::time::timeout(timeout, sink.close()).await {
        Ok(result) => result,
        Err(_) => Err(SinkError::TimedOut(timeout)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryChannelMetrics, ManualClock, RecordingWakeScheduler};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    // ─── Test Doubles ────────────────────────────────────────────────

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Behavior {
        Accept,
        Fail,
        Hang,
    }

    struct FakeSink {
        frames: Mutex<Vec<String>>,
        behavior: Mutex<Behavior>,
        close_fails: bool,
        closes: AtomicUsize,
    }

    impl FakeSink {
        fn with(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
                behavior: Mutex::new(behavior),
                close_fails: false,
                closes: AtomicUsize::new(0),
            })
        }

        fn healthy() -> Arc<Self> {
            Self::with(Behavior::Accept)
        }

        fn failing_close() -> Arc<Self> {
            Arc::new(Self {
                frames: Mutex::new(Vec::new()),
                behavior: Mutex::new(Behavior::Accept),
                close_fails: true,
                closes: AtomicUsize::new(0),
            })
        }

        fn set(&self, behavior: Behavior) {
            *self.behavior.lock().unwrap() = behavior;
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }

        fn clear(&self) {
            self.frames.lock().unwrap().clear();
        }

        fn closes(&self) -> usize {
            self.closes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Sink for FakeSink {
        async fn push(&self, frame: Bytes) -> Result<(), SinkError> {
            let behavior = *self.behavior.lock().unwrap();
            match behavior {
                Behavior::Accept => {
                    let text = String::from_utf8(frame.to_vec()).unwrap();
                    self.frames.lock().unwrap().push(text);
                    Ok(())
                }
                Behavior::Fail => Err(SinkError::Closed),
                Behavior::Hang => std::future::pending().await,
            }
        }

        async fn close(&self) -> Result<(), SinkError> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.close_fails {
                return Err(SinkError::Rejected("close failed".to_string()));
            }
            Ok(())
        }
    }

    struct Harness {
        actor: ChannelActor,
        clock: Arc<ManualClock>,
        scheduler: Arc<RecordingWakeScheduler>,
        metrics: Arc<InMemoryChannelMetrics>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_limits(ChannelLimits::default())
        }

        fn with_limits(limits: ChannelLimits) -> Self {
            let clock = Arc::new(ManualClock::default());
            let scheduler = Arc::new(RecordingWakeScheduler::new());
            let metrics = Arc::new(InMemoryChannelMetrics::new());
            let actor = ChannelActor::new(
                ChannelName::new("news").unwrap(),
                limits,
                clock.clone(),
                scheduler.clone(),
                metrics.clone(),
            );
            Self {
                actor,
                clock,
                scheduler,
                metrics,
            }
        }

        async fn open(&mut self, sink: &Arc<FakeSink>) -> SessionId {
            self.open_with(sink, None).await.unwrap()
        }

        async fn open_with(
            &mut self,
            sink: &Arc<FakeSink>,
            last_event_id: Option<&str>,
        ) -> Result<SessionId, ChannelError> {
            self.actor
                .open_connection(
                    SessionMetadata::default(),
                    last_event_id.map(MessageId::from_client),
                    sink.clone(),
                )
                .await
        }

        async fn send(&mut self, json: &str) -> Result<BroadcastOutcome, ChannelError> {
            self.actor.broadcast(body(json)).await
        }
    }

    fn body(json: &str) -> BroadcastRequest {
        BroadcastRequest {
            body: Some(Bytes::copy_from_slice(json.as_bytes())),
            declared_length: json.len() as u64,
            request_id: "req-1".to_string(),
        }
    }

    fn data_lines(frames: &[String]) -> Vec<String> {
        frames
            .iter()
            .filter(|f| f.starts_with("id: ") && !f.contains("event:"))
            .cloned()
            .collect()
    }

    // ─── Admission ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_open_writes_connect_test_and_comment_frames() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();

        h.open(&sink).await;

        let frames = sink.frames();
        let ts = h.clock.now().as_unix_millis();
        assert_eq!(frames.len(), 3);
        assert_eq!(
            frames[0],
            format!(
                "event: connect\nid: connect-{ts}\ndata: {{\"connected\":true,\"clients\":1,\"channel\":\"news\"}}\n\n"
            )
        );
        assert!(frames[1].starts_with("event: test\nid: test-"));
        assert_eq!(frames[2], format!(":initial-connection-complete {ts}\n\n"));
        assert_eq!(h.actor.client_count(), 1);
        assert_eq!(h.metrics.get("client_connected"), 1);
    }

    #[tokio::test]
    async fn test_connect_frame_reports_current_client_count() {
        let mut h = Harness::new();
        h.open(&FakeSink::healthy()).await;
        let second = FakeSink::healthy();

        h.open(&second).await;

        assert!(second.frames()[0].contains("\"clients\":2"));
    }

    #[tokio::test]
    async fn test_rejects_beyond_capacity_without_mutation() {
        let mut h = Harness::new();
        for _ in 0..1000 {
            h.open(&FakeSink::healthy()).await;
        }
        let rejected = FakeSink::healthy();

        let result = h.open_with(&rejected, None).await;

        assert_eq!(result, Err(ChannelError::CapacityExceeded { limit: 1000 }));
        assert_eq!(h.actor.client_count(), 1000);
        assert!(rejected.frames().is_empty());
        assert_eq!(h.metrics.get("error_too_many_connections"), 1);
        assert_eq!(h.metrics.get("client_connected"), 1000);
    }

    #[tokio::test]
    async fn test_first_session_arms_keepalive_once() {
        let mut h = Harness::new();
        let start = h.clock.now();

        h.open(&FakeSink::healthy()).await;
        h.open(&FakeSink::healthy()).await;

        assert_eq!(h.scheduler.count(), 1);
        let wake = h.scheduler.last().unwrap();
        assert_eq!(wake.at, start.plus_secs(30));
        assert_eq!(wake.channel.as_str(), "news");
        assert_eq!(h.actor.keepalive().wake_at(), Some(start.plus_secs(30)));
    }

    #[tokio::test]
    async fn test_scheduler_failure_leaves_keepalive_idle_for_retry() {
        let mut h = Harness::new();
        h.scheduler.set_failing(true);

        h.open(&FakeSink::healthy()).await;
        assert_eq!(h.actor.keepalive(), KeepaliveState::Idle);

        h.scheduler.set_failing(false);
        h.open(&FakeSink::healthy()).await;
        assert!(h.actor.keepalive().is_armed());
        assert_eq!(h.scheduler.count(), 1);
    }

    #[tokio::test]
    async fn test_handshake_failure_closes_session() {
        let mut h = Harness::new();
        let sink = FakeSink::with(Behavior::Fail);

        h.open(&sink).await;

        assert_eq!(h.actor.client_count(), 0);
        assert_eq!(sink.closes(), 1);
        assert_eq!(h.metrics.get("disconnect_reason_handshake_failed"), 1);
        assert_eq!(h.actor.keepalive(), KeepaliveState::Idle);
    }

    // ─── Close ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_close_twice_is_noop_second_time() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();
        let id = h.open(&sink).await;

        assert!(h.actor.close(id, CloseReason::ClientDisconnected).await);
        assert!(!h.actor.close(id, CloseReason::ClientDisconnected).await);

        assert_eq!(sink.closes(), 1);
        assert_eq!(h.metrics.get("client_disconnected"), 1);
        assert_eq!(h.metrics.get("disconnect_reason_client_disconnected"), 1);
    }

    #[tokio::test]
    async fn test_close_unknown_session_is_noop() {
        let mut h = Harness::new();
        assert!(!h.actor.close(SessionId::new(), CloseReason::PingFailed).await);
        assert_eq!(h.metrics.get("client_disconnected"), 0);
    }

    #[tokio::test]
    async fn test_close_removes_session_even_if_sink_close_fails() {
        let mut h = Harness::new();
        let sink = FakeSink::failing_close();
        let id = h.open(&sink).await;

        assert!(h.actor.close(id, CloseReason::ClientDisconnected).await);

        assert_eq!(h.actor.client_count(), 0);
        assert_eq!(h.metrics.get("client_disconnected"), 1);
    }

    // ─── Broadcast ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_broadcast_reaches_all_sessions_with_same_id() {
        let mut h = Harness::new();
        let sinks: Vec<_> = (0..3).map(|_| FakeSink::healthy()).collect();
        for sink in &sinks {
            h.open(sink).await;
            sink.clear();
        }

        let outcome = h.send(r#"{"message":"test"}"#).await.unwrap();

        assert_eq!((outcome.success, outcome.failure, outcome.stale), (3, 0, 0));
        assert_eq!(outcome.clients, 3);
        let expected = format!("id: {}\ndata: {{\"message\":\"test\"}}\n\n", outcome.message_id);
        for sink in &sinks {
            assert_eq!(sink.frames(), vec![expected.clone()]);
        }
        assert_eq!(h.actor.replay_buffer().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_counts_always_sum_to_live_sessions() {
        let mut h = Harness::new();
        let healthy = FakeSink::healthy();
        let broken = FakeSink::healthy();
        let idle = FakeSink::healthy();
        h.open(&healthy).await;
        h.open(&broken).await;
        let idle_id = h.open(&idle).await;

        // Two of the three stay active, the idle one goes stale.
        h.clock.advance(Duration::from_secs(100));
        h.send(r#"{"warmup":true}"#).await.unwrap();
        h.actor.sessions.touch(&idle_id, h.clock.now().minus(Duration::from_secs(121)));
        broken.set(Behavior::Fail);

        let outcome = h.send(r#"{"n":1}"#).await.unwrap();

        assert_eq!(outcome.attempted(), 3);
        assert_eq!((outcome.success, outcome.failure, outcome.stale), (1, 1, 1));
        assert_eq!(outcome.clients, 1);
        assert_eq!(h.metrics.get("disconnect_reason_broadcast_error"), 1);
        assert_eq!(h.metrics.get("disconnect_reason_stale_connection"), 1);
    }

    #[tokio::test]
    async fn test_stale_session_is_closed_not_written() {
        let mut h = Harness::new();
        let stale = FakeSink::healthy();
        h.open(&stale).await;
        stale.clear();

        h.clock.advance(Duration::from_secs(121));
        let outcome = h.send(r#"{"n":1}"#).await.unwrap();

        assert!(stale.frames().is_empty());
        assert_eq!(stale.closes(), 1);
        assert_eq!(outcome.stale, 1);
        assert_eq!(outcome.failure, 0);
        assert_eq!(h.metrics.get("stale_connections_removed"), 1);
        assert_eq!(h.metrics.get("broadcast_failure"), 0);
    }

    #[tokio::test]
    async fn test_session_at_exactly_stale_window_is_still_written() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();
        h.open(&sink).await;
        sink.clear();

        h.clock.advance(Duration::from_secs(120));
        let outcome = h.send(r#"{"n":1}"#).await.unwrap();

        assert_eq!(outcome.success, 1);
        assert_eq!(sink.frames().len(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_refreshes_activity_so_active_sessions_stay_fresh() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();
        h.open(&sink).await;

        for _ in 0..3 {
            h.clock.advance(Duration::from_secs(100));
            let outcome = h.send(r#"{"tick":true}"#).await.unwrap();
            assert_eq!(outcome.success, 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_sink_times_out_without_blocking_others() {
        let mut h = Harness::new();
        let healthy = FakeSink::healthy();
        let hung = FakeSink::healthy();
        h.open(&healthy).await;
        h.open(&hung).await;
        healthy.clear();
        hung.set(Behavior::Hang);

        let outcome = h.send(r#"{"n":1}"#).await.unwrap();

        assert_eq!((outcome.success, outcome.failure), (1, 1));
        assert_eq!(healthy.frames().len(), 1);
        assert_eq!(h.actor.client_count(), 1);
    }

    #[tokio::test]
    async fn test_oversized_declared_length_rejected_without_side_effects() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();
        h.open(&sink).await;
        sink.clear();

        let result = h
            .actor
            .broadcast(BroadcastRequest {
                body: Some(Bytes::from_static(b"not even json")),
                declared_length: 2 * 1024 * 1024,
                request_id: String::new(),
            })
            .await;

        assert!(matches!(result, Err(ChannelError::TooLarge { .. })));
        assert!(h.actor.replay_buffer().is_empty());
        assert!(sink.frames().is_empty());
        assert_eq!(h.metrics.get("error_message_too_large"), 1);
        assert_eq!(h.metrics.get("broadcast_complete"), 0);
    }

    #[tokio::test]
    async fn test_structural_errors_are_surfaced() {
        let mut h = Harness::new();

        let missing = h.actor.broadcast(BroadcastRequest::default()).await;
        assert_eq!(missing, Err(ChannelError::MissingBody));

        assert!(matches!(
            h.send("{oops").await,
            Err(ChannelError::InvalidJson(_))
        ));
        assert_eq!(h.send("[1,2,3]").await, Err(ChannelError::NotAnObject));
        assert_eq!(h.send("null").await, Err(ChannelError::NotAnObject));
        assert!(h.actor.replay_buffer().is_empty());
    }

    #[tokio::test]
    async fn test_broadcast_to_empty_channel_still_stores() {
        let mut h = Harness::new();

        let outcome = h.send(r#"{"n":1}"#).await.unwrap();

        assert_eq!(outcome.attempted(), 0);
        assert_eq!(h.actor.replay_buffer().len(), 1);
        assert_eq!(h.metrics.get("message_stored"), 1);
    }

    // ─── Replay ──────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_reconnect_replays_messages_after_last_event_id() {
        let mut h = Harness::new();
        let mut ids = Vec::new();
        for n in 1..=5 {
            ids.push(h.send(&format!("{{\"m\":{n}}}")).await.unwrap().message_id);
        }
        let sink = FakeSink::healthy();

        h.open_with(&sink, Some(ids[2].as_str())).await.unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 3 + 2 + 1);
        assert_eq!(
            data_lines(&frames),
            vec![
                format!("id: {}\ndata: {{\"m\":4}}\n\n", ids[3]),
                format!("id: {}\ndata: {{\"m\":5}}\n\n", ids[4]),
            ]
        );
        assert_eq!(frames.last().unwrap(), ":missed-messages-flush\n\n");
        assert_eq!(h.metrics.get("client_reconnect"), 1);
        assert_eq!(h.metrics.get("missed_messages_sent"), 2);
        assert_eq!(h.metrics.get("last_event_id_not_found"), 0);
    }

    #[tokio::test]
    async fn test_unknown_last_event_id_replays_entire_buffer() {
        let mut h = Harness::new();
        for n in 1..=3 {
            h.send(&format!("{{\"m\":{n}}}")).await.unwrap();
        }
        let sink = FakeSink::healthy();

        h.open_with(&sink, Some("unknown")).await.unwrap();

        assert_eq!(data_lines(&sink.frames()).len(), 3);
        assert_eq!(h.metrics.get("last_event_id_not_found"), 1);
    }

    #[tokio::test]
    async fn test_reconnect_with_latest_id_sends_only_flush() {
        let mut h = Harness::new();
        let last = h.send(r#"{"m":1}"#).await.unwrap().message_id;
        let sink = FakeSink::healthy();

        h.open_with(&sink, Some(last.as_str())).await.unwrap();

        let frames = sink.frames();
        assert_eq!(frames.len(), 4);
        assert!(data_lines(&frames).is_empty());
        assert_eq!(frames[3], ":missed-messages-flush\n\n");
    }

    #[tokio::test]
    async fn test_expired_messages_are_cleaned_on_next_operation() {
        let mut h = Harness::new();
        h.send(r#"{"old":true}"#).await.unwrap();
        h.clock.advance(Duration::from_secs(200));
        h.send(r#"{"newer":true}"#).await.unwrap();

        h.clock.advance(Duration::from_secs(101));
        h.open(&FakeSink::healthy()).await;

        let remaining: Vec<_> = h
            .actor
            .replay_buffer()
            .iter()
            .map(|m| m.payload.clone())
            .collect();
        assert_eq!(remaining, vec![r#"{"newer":true}"#.to_string()]);
        assert_eq!(h.metrics.get("messages_cleaned_up"), 1);
    }

    #[tokio::test]
    async fn test_buffer_keeps_only_most_recent_messages() {
        let mut h = Harness::new();
        for n in 0..150 {
            h.send(&format!("{{\"n\":{n}}}")).await.unwrap();
        }

        let buffer = h.actor.replay_buffer();
        assert_eq!(buffer.len(), 100);
        assert_eq!(buffer.iter().next().unwrap().payload, r#"{"n":50}"#);
        assert_eq!(h.metrics.get("message_trimmed"), 50);
    }

    // ─── Keepalive ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_wake_pings_sessions_and_rearms() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();
        h.open(&sink).await;
        sink.clear();

        h.clock.advance(Duration::from_secs(31));
        let sweep = h.actor.handle_wake().await;

        let fired = h.clock.now();
        let ts = fired.as_unix_millis();
        assert_eq!(
            sink.frames(),
            vec![
                format!("event: ping\nid: ping-{ts}\ndata: {{\"time\":{ts},\"channel\":\"news\"}}\n\n"),
                format!(":ping {ts}\n\n"),
            ]
        );
        assert_eq!(sweep.pinged, 1);
        assert_eq!(sweep.next_wake, Some(fired.plus_secs(30)));
        assert_eq!(h.scheduler.count(), 2);
        assert_eq!(h.scheduler.last().unwrap().at, fired.plus_secs(30));
        assert_eq!(h.metrics.get("ping_sent"), 1);
    }

    #[tokio::test]
    async fn test_ping_failure_closes_session_and_goes_idle() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();
        h.open(&sink).await;
        sink.set(Behavior::Fail);

        h.clock.advance(Duration::from_secs(30));
        let sweep = h.actor.handle_wake().await;

        assert_eq!(sweep.failed, 1);
        assert_eq!(sweep.next_wake, None);
        assert_eq!(h.actor.client_count(), 0);
        assert_eq!(h.actor.keepalive(), KeepaliveState::Idle);
        assert_eq!(h.scheduler.count(), 1);
        assert_eq!(h.metrics.get("disconnect_reason_ping_failed"), 1);
    }

    #[tokio::test]
    async fn test_successful_ping_keeps_session_fresh() {
        let mut h = Harness::new();
        let sink = FakeSink::healthy();
        h.open(&sink).await;

        for _ in 0..5 {
            h.clock.advance(Duration::from_secs(30));
            h.actor.handle_wake().await;
        }
        let outcome = h.send(r#"{"n":1}"#).await.unwrap();

        assert_eq!(outcome.stale, 0);
        assert_eq!(outcome.success, 1);
    }

    #[tokio::test]
    async fn test_idle_channel_rearms_on_next_admission() {
        let mut h = Harness::new();
        let id = h.open(&FakeSink::healthy()).await;
        h.actor.close(id, CloseReason::ClientDisconnected).await;
        h.clock.advance(Duration::from_secs(30));
        h.actor.handle_wake().await;
        assert_eq!(h.actor.keepalive(), KeepaliveState::Idle);

        h.open(&FakeSink::healthy()).await;

        assert!(h.actor.keepalive().is_armed());
        assert_eq!(h.scheduler.count(), 2);
    }

    #[tokio::test]
    async fn test_stats_reflect_state() {
        let mut h = Harness::new();
        h.open(&FakeSink::healthy()).await;
        h.send(r#"{"n":1}"#).await.unwrap();

        let stats = h.actor.stats();
        assert_eq!(stats.channel.as_str(), "news");
        assert_eq!(stats.clients, 1);
        assert_eq!(stats.buffered_messages, 1);
        assert!(stats.next_wake.is_some());
    }

    // ─── Shutdown ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_shutdown_closes_every_session_and_idles_keepalive() {
        let mut h = Harness::new();
        let first = FakeSink::healthy();
        let second = FakeSink::healthy();
        h.open(&first).await;
        h.open(&second).await;

        let closed = h.actor.shutdown().await;

        assert_eq!(closed, 2);
        assert_eq!(h.actor.client_count(), 0);
        assert_eq!(first.closes(), 1);
        assert_eq!(second.closes(), 1);
        assert_eq!(h.actor.keepalive(), KeepaliveState::Idle);
        assert_eq!(h.metrics.get("disconnect_reason_server_shutdown"), 2);
    }
}
