//! Broadcast body validation.
//!
//! Checks run in a fixed order: presence, declared size, actual size, JSON
//! syntax, then shape. The size checks happen before any parsing so an
//! oversized body is never deserialized.

use serde_json::Value;

use super::ChannelError;

/// Validates a raw broadcast body and returns its compact serialization.
///
/// `declared_length` is the length announced by the transport (for HTTP, the
/// `Content-Length` header); zero means "not declared".
pub fn validate_broadcast_body(
    body: Option<&[u8]>,
    declared_length: u64,
    max_bytes: u64,
) -> Result<String, ChannelError> {
    let body = match body {
        Some(body) if !body.is_empty() => body,
        _ => return Err(ChannelError::MissingBody),
    };

    if declared_length > max_bytes {
        return Err(ChannelError::TooLarge {
            size: declared_length,
            max: max_bytes,
        });
    }
    let actual = body.len() as u64;
    if actual > max_bytes {
        return Err(ChannelError::TooLarge {
            size: actual,
            max: max_bytes,
        });
    }

    let value: Value =
        serde_json::from_slice(body).map_err(|e| ChannelError::InvalidJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ChannelError::NotAnObject);
    }

    serde_json::to_string(&value).map_err(|e| ChannelError::InvalidJson(e.to_string()))
}
