//! In-memory channel counters.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::ports::ChannelMetrics;

/// Counter map for one channel actor.
///
/// Counters are created on first increment; reading an untouched counter
/// yields zero.
#[derive(Debug, Default)]
pub struct InMemoryChannelMetrics {
    counters: Mutex<BTreeMap<String, u64>>,
}

impl InMemoryChannelMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of one counter.
    pub fn get(&self, counter: &str) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(counter)
            .copied()
            .unwrap_or(0)
    }
}

impl ChannelMetrics for InMemoryChannelMetrics {
    fn increment(&self, counter: &str, by: u64) {
        let mut counters = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        *counters.entry(counter.to_string()).or_insert(0) += by;
    }

    fn snapshot(&self) -> BTreeMap<String, u64> {
        self.counters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}
