//! Event-stream session transport.

mod stream;

pub use stream::{session_channel, ChannelSink, SessionStream};
