//! Wake scheduler adapters.

mod recording;
mod tokio_timer;

pub use recording::RecordingWakeScheduler;
pub use tokio_timer::{TokioWakeScheduler, WakeReceiver};
