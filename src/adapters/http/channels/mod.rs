//! Channel endpoints: subscribe, broadcast, health and metrics.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::{RelayState, X_REQUEST_ID};
pub use routes::channel_routes;
