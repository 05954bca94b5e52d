//! Clock port - source of the current time.
//!
//! All staleness, TTL and keepalive decisions read time through this port so
//! tests can drive them with a manual clock.

use crate::domain::foundation::Timestamp;

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}
