//! ChannelMetrics port - counters for one channel actor.
//!
//! One instance is injected per actor; instances are never shared between
//! channels.

use std::collections::BTreeMap;

pub trait ChannelMetrics: Send + Sync {
    /// Adds `by` to the named counter.
    fn increment(&self, counter: &str, by: u64);

    /// Current value of every counter touched so far.
    fn snapshot(&self) -> BTreeMap<String, u64>;
}
