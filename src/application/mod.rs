//! Application layer - the channel actor and the plumbing that runs it.
//!
//! - [`ChannelActor`] owns one channel's sessions, replay buffer and
//!   keepalive state, and performs all sink I/O.
//! - [`ChannelHandle`] runs an actor in its own task behind a mailbox, which
//!   serializes every operation on the channel.
//! - [`ChannelDirectory`] maps channel names to handles and routes wakes.

mod channel_actor;
mod channel_directory;
mod channel_handle;

pub use channel_actor::{BroadcastRequest, ChannelActor, SharedSink};
pub use channel_directory::{ChannelDirectory, MetricsFactory};
pub use channel_handle::{ChannelCommand, ChannelHandle};
