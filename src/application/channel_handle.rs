//! ChannelHandle - mailbox front-end for a [`ChannelActor`] task.
//!
//! The actor runs in its own tokio task and processes one command at a time,
//! which is what serializes every operation on a channel. Handles are cheap
//! to clone and are the only way callers reach the actor.

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::domain::channel::{BroadcastOutcome, ChannelError, ChannelStats, CloseReason, SessionMetadata, SweepOutcome};
use crate::domain::foundation::{ChannelName, MessageId, SessionId};

use super::channel_actor::{BroadcastRequest, ChannelActor, SharedSink};

/// Commands accepted by the actor task.
pub enum ChannelCommand {
    Open {
        metadata: SessionMetadata,
        last_event_id: Option<MessageId>,
        sink: SharedSink,
        respond_to: oneshot::Sender<Result<SessionId, ChannelError>>,
    },
    Broadcast {
        request: BroadcastRequest,
        respond_to: oneshot::Sender<Result<BroadcastOutcome, ChannelError>>,
    },
    Close {
        session_id: SessionId,
        reason: CloseReason,
        respond_to: Option<oneshot::Sender<bool>>,
    },
    Wake {
        respond_to: Option<oneshot::Sender<SweepOutcome>>,
    },
    Stats {
        respond_to: oneshot::Sender<ChannelStats>,
    },
    /// Closes every session and stops the actor task.
    Shutdown {
        respond_to: oneshot::Sender<usize>,
    },
}

#[derive(Clone)]
pub struct ChannelHandle {
    channel: ChannelName,
    sender: mpsc::Sender<ChannelCommand>,
}

impl ChannelHandle {
    /// Spawns the actor task and returns its handle and join handle.
    ///
    /// The task ends once every handle has been dropped.
    pub fn spawn(actor: ChannelActor, mailbox_capacity: usize) -> (Self, JoinHandle<()>) {
        let channel = actor.channel().clone();
        let (sender, receiver) = mpsc::channel(mailbox_capacity.max(1));
        let span = tracing::info_span!("channel_actor", channel = %channel);
        let task = tokio::spawn(run(actor, receiver).instrument(span));
        (Self { channel, sender }, task)
    }

    pub fn channel(&self) -> &ChannelName {
        &self.channel
    }

    /// Admits a session. Once admitted, cancelling `disconnect` closes it
    /// with [`CloseReason::ClientDisconnected`].
    pub async fn open_connection(
        &self,
        metadata: SessionMetadata,
        last_event_id: Option<MessageId>,
        sink: SharedSink,
        disconnect: CancellationToken,
    ) -> Result<SessionId, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ChannelCommand::Open {
            metadata,
            last_event_id,
            sink,
            respond_to,
        })
        .await?;
        let session_id = response.await.map_err(|_| ChannelError::Unavailable)??;

        let sender = self.sender.clone();
        tokio::spawn(async move {
            disconnect.cancelled().await;
            let _ = sender
                .send(ChannelCommand::Close {
                    session_id,
                    reason: CloseReason::ClientDisconnected,
                    respond_to: None,
                })
                .await;
        });

        Ok(session_id)
    }

    pub async fn broadcast(&self, request: BroadcastRequest) -> Result<BroadcastOutcome, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ChannelCommand::Broadcast { request, respond_to })
            .await?;
        response.await.map_err(|_| ChannelError::Unavailable)?
    }

    /// Closes a session and waits for the actor to process it. Returns
    /// whether the session was still live.
    pub async fn close(&self, session_id: SessionId, reason: CloseReason) -> Result<bool, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ChannelCommand::Close {
            session_id,
            reason,
            respond_to: Some(respond_to),
        })
        .await?;
        response.await.map_err(|_| ChannelError::Unavailable)
    }

    /// Delivers a scheduled wake without waiting for the sweep.
    pub async fn wake(&self) -> Result<(), ChannelError> {
        self.send(ChannelCommand::Wake { respond_to: None }).await
    }

    /// Delivers a scheduled wake and waits for the sweep result.
    pub async fn wake_and_wait(&self) -> Result<SweepOutcome, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ChannelCommand::Wake {
            respond_to: Some(respond_to),
        })
        .await?;
        response.await.map_err(|_| ChannelError::Unavailable)
    }

    pub async fn stats(&self) -> Result<ChannelStats, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ChannelCommand::Stats { respond_to }).await?;
        response.await.map_err(|_| ChannelError::Unavailable)
    }

    /// Closes every session and stops the actor. Returns the number of
    /// sessions closed; later commands fail with [`ChannelError::Unavailable`].
    pub async fn shutdown(&self) -> Result<usize, ChannelError> {
        let (respond_to, response) = oneshot::channel();
        self.send(ChannelCommand::Shutdown { respond_to }).await?;
        response.await.map_err(|_| ChannelError::Unavailable)
    }

    async fn send(&self, command: ChannelCommand) -> Result<(), ChannelError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| ChannelError::Unavailable)
    }
}

async fn run(mut actor: ChannelActor, mut receiver: mpsc::Receiver<ChannelCommand>) {
    tracing::debug!("channel actor started");

    while let Some(command) = receiver.recv().await {
        match command {
            ChannelCommand::Open {
                metadata,
                last_event_id,
                sink,
                respond_to,
            } => {
                let result = actor.open_connection(metadata, last_event_id, sink).await;
                if let Err(Ok(session_id)) = respond_to.send(result) {
                    // Caller went away before seeing its session.
                    actor.close(session_id, CloseReason::ClientDisconnected).await;
                }
            }
            ChannelCommand::Broadcast { request, respond_to } => {
                let _ = respond_to.send(actor.broadcast(request).await);
            }
            ChannelCommand::Close {
                session_id,
                reason,
                respond_to,
            } => {
                let closed = actor.close(session_id, reason).await;
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(closed);
                }
            }
            ChannelCommand::Wake { respond_to } => {
                let sweep = actor.handle_wake().await;
                if let Some(respond_to) = respond_to {
                    let _ = respond_to.send(sweep);
                }
            }
            ChannelCommand::Stats { respond_to } => {
                let _ = respond_to.send(actor.stats());
            }
            ChannelCommand::Shutdown { respond_to } => {
                let _ = respond_to.send(actor.shutdown().await);
                break;
            }
        }
    }

    tracing::debug!("channel actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{session_channel, InMemoryChannelMetrics, ManualClock, RecordingWakeScheduler};
    use crate::domain::channel::ChannelLimits;
    use bytes::Bytes;
    use futures::StreamExt;
    use std::sync::Arc;

    fn spawn_handle() -> (ChannelHandle, Arc<InMemoryChannelMetrics>) {
        let metrics = Arc::new(InMemoryChannelMetrics::new());
        let actor = ChannelActor::new(
            ChannelName::new("news").unwrap(),
            ChannelLimits::default(),
            Arc::new(ManualClock::default()),
            Arc::new(RecordingWakeScheduler::new()),
            metrics.clone(),
        );
        let (handle, _task) = ChannelHandle::spawn(actor, 16);
        (handle, metrics)
    }

    fn json(body: &'static str) -> BroadcastRequest {
        BroadcastRequest {
            body: Some(Bytes::from_static(body.as_bytes())),
            declared_length: body.len() as u64,
            request_id: String::new(),
        }
    }

    #[tokio::test]
    async fn test_open_and_broadcast_through_mailbox() {
        let (handle, _) = spawn_handle();
        let (sink, mut stream) = session_channel(128);

        handle
            .open_connection(
                SessionMetadata::default(),
                None,
                Arc::new(sink),
                CancellationToken::new(),
            )
            .await
            .unwrap();
        let outcome = handle.broadcast(json(r#"{"hello":"world"}"#)).await.unwrap();

        let frames: Vec<Bytes> = (&mut stream).take(4).collect().await;
        assert!(frames[0].starts_with(b"event: connect"));
        assert_eq!(
            frames[3],
            Bytes::from(format!("id: {}\ndata: {{\"hello\":\"world\"}}\n\n", outcome.message_id))
        );
        assert_eq!(outcome.success, 1);
    }

    #[tokio::test]
    async fn test_cancelling_disconnect_token_closes_session_once() {
        let (handle, metrics) = spawn_handle();
        let (sink, mut stream) = session_channel(128);
        let token = CancellationToken::new();

        let session_id = handle
            .open_connection(SessionMetadata::default(), None, Arc::new(sink), token.clone())
            .await
            .unwrap();
        token.cancel();

        // The stream ends once the actor has closed the sink.
        while stream.next().await.is_some() {}
        assert_eq!(handle.stats().await.unwrap().clients, 0);
        assert!(!handle
            .close(session_id, CloseReason::ClientDisconnected)
            .await
            .unwrap());
        assert_eq!(metrics.get("client_disconnected"), 1);
    }

    #[tokio::test]
    async fn test_dropping_stream_disconnects_session() {
        let (handle, _) = spawn_handle();
        let (sink, stream) = session_channel(128);
        let token = CancellationToken::new();
        let stream = stream.cancel_on_drop(token.clone());

        handle
            .open_connection(SessionMetadata::default(), None, Arc::new(sink), token)
            .await
            .unwrap();
        drop(stream);

        for _ in 0..100 {
            if handle.stats().await.unwrap().clients == 0 {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("session was not closed after the stream was dropped");
    }

    #[tokio::test]
    async fn test_wake_and_wait_returns_sweep() {
        let (handle, _) = spawn_handle();
        let (sink, _stream) = session_channel(128);
        handle
            .open_connection(SessionMetadata::default(), None, Arc::new(sink), CancellationToken::new())
            .await
            .unwrap();

        let sweep = handle.wake_and_wait().await.unwrap();

        assert_eq!(sweep.pinged, 1);
        assert!(sweep.next_wake.is_some());
    }

    #[tokio::test]
    async fn test_stopped_actor_reports_unavailable() {
        let actor = ChannelActor::new(
            ChannelName::new("gone").unwrap(),
            ChannelLimits::default(),
            Arc::new(ManualClock::default()),
            Arc::new(RecordingWakeScheduler::new()),
            Arc::new(InMemoryChannelMetrics::new()),
        );
        let (handle, task) = ChannelHandle::spawn(actor, 4);
        task.abort();
        let _ = task.await;

        assert_eq!(handle.stats().await, Err(ChannelError::Unavailable));
    }

    #[tokio::test]
    async fn test_shutdown_ends_streams_and_stops_actor() {
        let (handle, metrics) = spawn_handle();
        let (sink, mut stream) = session_channel(128);
        handle
            .open_connection(SessionMetadata::default(), None, Arc::new(sink), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(handle.shutdown().await.unwrap(), 1);

        // Handshake frames drain, then the stream ends.
        while stream.next().await.is_some() {}
        assert_eq!(metrics.get("disconnect_reason_server_shutdown"), 1);
        assert_eq!(handle.stats().await, Err(ChannelError::Unavailable));
    }
}
