//! Channel domain - state owned by one broadcast channel.
//!
//! Everything here is synchronous and transport-agnostic. The
//! [`ChannelActor`](crate::application::ChannelActor) composes these pieces
//! and performs the I/O.
//!
//! - [`session`] - session records and the capacity-bounded table
//! - [`replay_buffer`] - bounded, TTL'd history for reconnecting clients
//! - [`keepalive`] - Idle/Armed keepalive state machine
//! - [`frame`] - event-stream wire framing
//! - [`payload`] - broadcast body validation

pub mod close_reason;
pub mod errors;
pub mod frame;
pub mod keepalive;
pub mod limits;
pub mod outcome;
pub mod payload;
pub mod replay_buffer;
pub mod session;

pub use close_reason::CloseReason;
pub use errors::ChannelError;
pub use keepalive::KeepaliveState;
pub use limits::{ChannelLimits, HANDSHAKE_FRAMES};
pub use outcome::{BroadcastOutcome, ChannelStats, SweepOutcome};
pub use payload::validate_broadcast_body;
pub use replay_buffer::{AppendOutcome, ReplayBuffer, ReplayLookup, StoredMessage};
pub use session::{Session, SessionMetadata, SessionTable};
