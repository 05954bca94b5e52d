//! Authentication adapters.
//!
//! Implementations of the `BroadcastAuthenticator` port:
//!
//! - `static_token` - single shared API token from configuration

mod static_token;

pub use static_token::StaticTokenAuthenticator;
