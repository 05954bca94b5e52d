//! SSE Relay - per-channel Server-Sent Events broadcast service
//!
//! Clients subscribe to a named channel over a long-lived event stream;
//! publishers POST JSON messages that are fanned out to every subscriber.
//! Each channel is served by a single actor that owns its sessions, a
//! bounded replay buffer for reconnecting clients, and a keepalive schedule.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
