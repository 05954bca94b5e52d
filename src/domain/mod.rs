//! Domain layer - relay state and rules, free of I/O.

pub mod channel;
pub mod foundation;
