//! Channel-backed session sink and the byte stream it feeds.
//!
//! `ChannelSink` never waits for the client: a full buffer rejects the frame
//! so one slow reader cannot hold up a broadcast. The buffer must therefore
//! be large enough for a whole reconnect burst, since the stream is not
//! polled until the HTTP response has been handed back.

use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::ports::{Sink, SinkError};

/// Creates a connected sink/stream pair holding up to `buffer` frames.
pub fn session_channel(buffer: usize) -> (ChannelSink, SessionStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        ChannelSink {
            tx: Mutex::new(Some(tx)),
        },
        SessionStream {
            rx,
            disconnect: None,
        },
    )
}

/// Writing half, owned by the channel actor's session table.
#[derive(Debug)]
pub struct ChannelSink {
    tx: Mutex<Option<mpsc::Sender<Bytes>>>,
}

#[async_trait]
impl Sink for ChannelSink {
    async fn push(&self, frame: Bytes) -> Result<(), SinkError> {
        let guard = self.tx.lock().unwrap_or_else(|e| e.into_inner());
        let tx = guard.as_ref().ok_or(SinkError::Closed)?;
        tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => SinkError::Rejected("client buffer full".to_string()),
            TrySendError::Closed(_) => SinkError::Closed,
        })
    }

    async fn close(&self) -> Result<(), SinkError> {
        // Dropping the sender ends the stream once queued frames are drained.
        self.tx.lock().unwrap_or_else(|e| e.into_inner()).take();
        Ok(())
    }
}

/// Reading half, used as the HTTP response body.
///
/// Dropping the stream (the client went away) cancels the attached
/// disconnect token.
#[derive(Debug)]
pub struct SessionStream {
    rx: mpsc::Receiver<Bytes>,
    disconnect: Option<DropGuard>,
}

impl SessionStream {
    /// Cancels `token` when this stream is dropped.
    pub fn cancel_on_drop(mut self, token: CancellationToken) -> Self {
        self.disconnect = Some(token.drop_guard());
        self
    }
}

impl Stream for SessionStream {
    type Item = Bytes;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
